//! Saving and restoring the game state
//!
//! A snapshot is a flat copy of every session, dog, lost object and player,
//! ids included, plus the leaderboard of retired players, so a restarted server continues exactly where the old one
//! stopped. Snapshots are written with bincode to a temporary file first and
//! then moved over the target, so a crash mid-write never leaves a truncated
//! state file behind.

use crate::game::Game;
use crate::model::{Dog, DogId, Item, ItemId, Map, SessionId};
use crate::players::{Player, PlayerRegistry, RetiredPlayer};
use log::info;
use serde::{Deserialize, Serialize};
use shared::{Direction, Vector2};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("State file is corrupt: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Saved session refers to unknown map {0}")]
    UnknownMap(String),

    #[error("Saved item refers to unknown loot type {type_index} on map {map_id}")]
    UnknownLootType { map_id: String, type_index: usize },

    #[error("Saved dog {dog_id} in session {session_id} has no player")]
    DogWithoutPlayer { session_id: SessionId, dog_id: DogId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub type_index: usize,
    pub position: Vector2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DogSnapshot {
    pub id: DogId,
    pub position: Vector2,
    pub speed: Vector2,
    pub direction: Direction,
    pub bag: Vec<ItemSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub map_id: String,
    pub last_item_id: ItemId,
    pub dogs: Vec<DogSnapshot>,
    pub items: Vec<ItemSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub token: String,
    pub id: DogId,
    pub name: String,
    pub session_id: SessionId,
    pub score: u64,
    pub play_time: Duration,
    pub idle_time: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub name: String,
    pub score: u64,
    pub play_time: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub sessions: Vec<SessionSnapshot>,
    pub players: Vec<PlayerSnapshot>,
    pub next_player_id: DogId,
    /// Retired players in leaderboard order
    pub records: Vec<RecordSnapshot>,
}

impl From<&Item> for ItemSnapshot {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            type_index: item.item_type.type_index,
            position: item.position,
        }
    }
}

impl From<&Dog> for DogSnapshot {
    fn from(dog: &Dog) -> Self {
        Self {
            id: dog.id(),
            position: dog.position(),
            speed: dog.speed(),
            direction: dog.direction(),
            bag: dog.bag().iter().map(ItemSnapshot::from).collect(),
        }
    }
}

impl From<&Player> for PlayerSnapshot {
    fn from(player: &Player) -> Self {
        Self {
            token: player.token.clone(),
            id: player.id,
            name: player.name.clone(),
            session_id: player.session_id,
            score: player.score,
            play_time: player.play_time,
            idle_time: player.idle_time,
        }
    }
}

impl From<PlayerSnapshot> for Player {
    fn from(snapshot: PlayerSnapshot) -> Self {
        Player {
            token: snapshot.token,
            id: snapshot.id,
            name: snapshot.name,
            session_id: snapshot.session_id,
            score: snapshot.score,
            play_time: snapshot.play_time,
            idle_time: snapshot.idle_time,
        }
    }
}

impl From<&RetiredPlayer> for RecordSnapshot {
    fn from(record: &RetiredPlayer) -> Self {
        Self {
            name: record.name.clone(),
            score: record.score,
            play_time: record.play_time,
        }
    }
}

impl From<RecordSnapshot> for RetiredPlayer {
    fn from(snapshot: RecordSnapshot) -> Self {
        RetiredPlayer {
            name: snapshot.name,
            score: snapshot.score,
            play_time: snapshot.play_time,
        }
    }
}

impl ItemSnapshot {
    fn restore(&self, map: &Map) -> Result<Item, SnapshotError> {
        let item_type =
            map.loot_type(self.type_index)
                .ok_or_else(|| SnapshotError::UnknownLootType {
                    map_id: map.id().to_string(),
                    type_index: self.type_index,
                })?;
        Ok(Item {
            id: self.id,
            item_type,
            position: self.position,
        })
    }
}

/// Copies the whole game state.
pub fn capture(game: &Game, registry: &PlayerRegistry) -> GameSnapshot {
    GameSnapshot {
        sessions: game
            .sessions()
            .iter()
            .map(|session| SessionSnapshot {
                id: session.id(),
                map_id: session.map().id().to_string(),
                last_item_id: session.last_item_id(),
                dogs: session.dogs().iter().map(DogSnapshot::from).collect(),
                items: session.items().iter().map(ItemSnapshot::from).collect(),
            })
            .collect(),
        players: registry.players().iter().map(PlayerSnapshot::from).collect(),
        next_player_id: registry.next_player_id(),
        records: registry
            .all_records()
            .iter()
            .map(RecordSnapshot::from)
            .collect(),
    }
}

/// Every saved dog must belong to a saved player, or its deliveries would have no one to credit.
fn check_dog_owners(snapshot: &GameSnapshot) -> Result<(), SnapshotError> {
    let owners: HashSet<(SessionId, DogId)> = snapshot
        .players
        .iter()
        .map(|player| (player.session_id, player.id))
        .collect();

    for session in &snapshot.sessions {
        for dog in &session.dogs {
            if !owners.contains(&(session.id, dog.id)) {
                return Err(SnapshotError::DogWithoutPlayer {
                    session_id: session.id,
                    dog_id: dog.id,
                });
            }
        }
    }
    Ok(())
}

/// Loads `snapshot` into a freshly configured game and an empty registry.
pub fn restore(
    snapshot: GameSnapshot,
    game: &mut Game,
    registry: &mut PlayerRegistry,
) -> Result<(), SnapshotError> {
    check_dog_owners(&snapshot)?;

    for saved in &snapshot.sessions {
        let session = game
            .restore_session(saved.id, &saved.map_id)
            .ok_or_else(|| SnapshotError::UnknownMap(saved.map_id.clone()))?;
        let map = Arc::clone(session.map());

        for dog in &saved.dogs {
            let bag = dog
                .bag
                .iter()
                .map(|item| item.restore(&map))
                .collect::<Result<Vec<_>, _>>()?;
            session.add_dog(Dog::restore(dog.id, dog.position, dog.speed, dog.direction, bag));
        }
        for item in &saved.items {
            session.restore_item(item.restore(&map)?);
        }
        session.set_last_item_id(saved.last_item_id);
    }

    for player in snapshot.players {
        registry.restore_player(player.into());
    }
    registry.set_next_player_id(snapshot.next_player_id);
    for record in snapshot.records {
        registry.add_record(record.into());
    }

    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

pub fn save_to_file(snapshot: &GameSnapshot, path: &Path) -> Result<(), SnapshotError> {
    let bytes = bincode::serialize(snapshot)?;
    let tmp = temp_path(path);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    info!(
        "Saved {} sessions and {} players to {}",
        snapshot.sessions.len(),
        snapshot.players.len(),
        path.display()
    );
    Ok(())
}

pub fn load_from_file(path: &Path) -> Result<GameSnapshot, SnapshotError> {
    let bytes = std::fs::read(path)?;
    Ok(bincode::deserialize(&bytes)?)
}

/// Tracks game time between automatic saves
#[derive(Debug)]
pub struct AutoSaver {
    period: Duration,
    since_save: Duration,
}

impl AutoSaver {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            since_save: Duration::ZERO,
        }
    }

    /// Accounts for `delta` of game time; true when a save is due.
    pub fn on_tick(&mut self, delta: Duration) -> bool {
        self.since_save = self.since_save.saturating_add(delta);
        if self.since_save >= self.period {
            self.since_save = Duration::ZERO;
            true
        } else {
            false
        }
    }
}

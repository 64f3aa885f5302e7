//! Player registry, authentication tokens and idle retirement
//!
//! This module owns everything the server knows about the people behind the dogs:
//! - Joining a map and receiving an auth token
//! - Looking players up by token or id for every later request
//! - Crediting score delivered to offices
//! - Retiring dogs that stood still for too long
//! - Keeping the results of retired players as a leaderboard
//!
//! The registry is a plain value owned by the server loop; tests build a
//! fresh one whenever they need it.

use crate::game::Game;
use crate::gathering::ScoreSink;
use crate::model::{DogId, SessionId};
use log::info;
use rand::Rng;
use shared::TOKEN_LENGTH;
use std::cmp::Ordering;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum JoinError {
    #[error("Invalid player name")]
    EmptyName,

    #[error("Map {0} not found")]
    UnknownMap(String),

    #[error("Server is full ({0} players)")]
    ServerFull(usize),
}

/// A joined player and the dog they control
///
/// The dog shares the player's id and lives in the session `session_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Secret handed to the client on join, required by every later request
    pub token: String,
    pub id: DogId,
    pub name: String,
    pub session_id: SessionId,
    pub score: u64,
    /// Time spent in the game since joining
    pub play_time: Duration,
    /// Time the dog has been standing still
    pub idle_time: Duration,
}

impl Player {
    pub fn new(token: String, id: DogId, name: String, session_id: SessionId) -> Self {
        Self {
            token,
            id,
            name,
            session_id,
            score: 0,
            play_time: Duration::ZERO,
            idle_time: Duration::ZERO,
        }
    }

    /// Accounts for `delta` of game time. A moving dog resets the idle clock.
    pub fn record_activity(&mut self, delta: Duration, moving: bool) {
        self.play_time = self.play_time.saturating_add(delta);
        if moving {
            self.idle_time = Duration::ZERO;
        } else {
            self.idle_time = self.idle_time.saturating_add(delta);
        }
    }
}

/// Final result of a player whose dog left the game
#[derive(Debug, Clone, PartialEq)]
pub struct RetiredPlayer {
    pub name: String,
    pub score: u64,
    pub play_time: Duration,
}

impl RetiredPlayer {
    /// Leaderboard order: best score first, then shorter play time, then name.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then(self.play_time.cmp(&other.play_time))
            .then_with(|| self.name.cmp(&other.name))
    }
}

/// Largest page of results handed out at once
pub const MAX_RECORDS_PAGE: usize = 100;

/// Generates a random token of `TOKEN_LENGTH` lowercase hex digits.
pub fn generate_token<R: Rng + ?Sized>(rng: &mut R) -> String {
    let token = format!("{:016x}{:016x}", rng.gen::<u64>(), rng.gen::<u64>());
    debug_assert_eq!(token.len(), TOKEN_LENGTH);
    token
}

/// All players currently in the game, in join order
pub struct PlayerRegistry {
    players: Vec<Player>,
    /// Id handed to the next player to join
    next_player_id: DogId,
    /// Maximum number of concurrent players allowed
    max_players: usize,
    /// Retired players, kept in leaderboard order
    records: Vec<RetiredPlayer>,
}

impl PlayerRegistry {
    /// Creates an empty registry. Player ids start from 1.
    pub fn new(max_players: usize) -> Self {
        Self {
            players: Vec::new(),
            next_player_id: 1,
            max_players,
            records: Vec::new(),
        }
    }

    /// Joins `name` to the session playing `map_id`
    ///
    /// Spawns the player's dog and issues a fresh token. The name is stored
    /// as given; a name that is empty after trimming is rejected.
    pub fn add_player(
        &mut self,
        name: &str,
        game: &mut Game,
        map_id: &str,
    ) -> Result<&Player, JoinError> {
        if name.trim().is_empty() {
            return Err(JoinError::EmptyName);
        }
        if game.find_map(map_id).is_none() {
            return Err(JoinError::UnknownMap(map_id.to_string()));
        }
        if self.players.len() >= self.max_players {
            return Err(JoinError::ServerFull(self.max_players));
        }

        let id = self.next_player_id;
        let session_id = game
            .spawn_dog(map_id, id)
            .ok_or_else(|| JoinError::UnknownMap(map_id.to_string()))?;
        self.next_player_id += 1;

        let token = self.unique_token();
        info!("Player {} ({}) joined session {}", id, name, session_id);
        self.players
            .push(Player::new(token, id, name.to_string(), session_id));
        Ok(&self.players[self.players.len() - 1])
    }

    fn unique_token(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let token = generate_token(&mut rng);
            if self.find_by_token(&token).is_none() {
                return token;
            }
        }
    }

    /// Puts back a player loaded from saved state; later ids continue after it.
    pub fn restore_player(&mut self, player: Player) {
        self.next_player_id = self.next_player_id.max(player.id + 1);
        self.players.push(player);
    }

    pub fn find_by_token(&self, token: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.token == token)
    }

    pub fn find_by_id(&self, session_id: SessionId, id: DogId) -> Option<&Player> {
        self.players
            .iter()
            .find(|player| player.session_id == session_id && player.id == id)
    }

    fn find_by_id_mut(&mut self, session_id: SessionId, id: DogId) -> Option<&mut Player> {
        self.players
            .iter_mut()
            .find(|player| player.session_id == session_id && player.id == id)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn players_in_session(&self, session_id: SessionId) -> impl Iterator<Item = &Player> {
        self.players
            .iter()
            .filter(move |player| player.session_id == session_id)
    }

    /// Removes a player from the registry together with their dog.
    pub fn remove_player(&mut self, token: &str, game: &mut Game) -> Option<Player> {
        let idx = self.players.iter().position(|player| player.token == token)?;
        let player = self.players.remove(idx);
        game.remove_dog(player.session_id, player.id);
        Some(player)
    }

    pub fn next_player_id(&self) -> DogId {
        self.next_player_id
    }

    pub fn set_next_player_id(&mut self, id: DogId) {
        self.next_player_id = self.next_player_id.max(id);
    }

    /// Advances every player's clocks by `delta` and retires idle dogs
    ///
    /// A player whose dog stood still for at least the game's retirement time
    /// is removed together with the dog and enters the leaderboard. Returns
    /// the final results of the retired players.
    pub fn update_activity(&mut self, game: &mut Game, delta: Duration) -> Vec<RetiredPlayer> {
        let retirement_time = game.settings().retirement_time;

        for player in &mut self.players {
            let moving = game
                .session(player.session_id)
                .and_then(|session| session.dog(player.id))
                .is_some_and(|dog| !dog.is_stopped());
            player.record_activity(delta, moving);
        }

        let (retired, active): (Vec<Player>, Vec<Player>) = std::mem::take(&mut self.players)
            .into_iter()
            .partition(|player| player.idle_time >= retirement_time);
        self.players = active;

        let retired: Vec<RetiredPlayer> = retired
            .into_iter()
            .map(|player| {
                game.remove_dog(player.session_id, player.id);
                info!(
                    "Player {} ({}) retired with score {} after {:.1}s",
                    player.id,
                    player.name,
                    player.score,
                    player.play_time.as_secs_f64()
                );
                RetiredPlayer {
                    name: player.name,
                    score: player.score,
                    play_time: player.play_time,
                }
            })
            .collect();

        for result in &retired {
            self.add_record(result.clone());
        }
        retired
    }

    /// Inserts a result at its leaderboard position; equal results keep arrival order.
    pub fn add_record(&mut self, record: RetiredPlayer) {
        let idx = self
            .records
            .partition_point(|existing| existing.rank_cmp(&record) != Ordering::Greater);
        self.records.insert(idx, record);
    }

    /// Up to `max_items` leaderboard entries starting at rank `start` (0-based).
    pub fn records(&self, start: usize, max_items: usize) -> &[RetiredPlayer] {
        let start = start.min(self.records.len());
        let end = start.saturating_add(max_items).min(self.records.len());
        &self.records[start..end]
    }

    pub fn all_records(&self) -> &[RetiredPlayer] {
        &self.records
    }

    /// Returns the number of players in the game
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl ScoreSink for PlayerRegistry {
    fn add_scores(&mut self, session_id: SessionId, dog_id: DogId, amount: u64) {
        let player = self
            .find_by_id_mut(session_id, dog_id)
            .unwrap_or_else(|| panic!("dog {} in session {} has no player", dog_id, session_id));
        player.score = player.score.saturating_add(amount);
    }
}

//! The state owned by the server loop and the requests that act on it
//!
//! `Simulation` holds the game world and the player registry outright. The
//! network layer hands it one request or one tick at a time, so nothing in
//! here ever runs concurrently with anything else.

use crate::game::{Game, TickSummary};
use crate::model::Map;
use crate::players::{JoinError, PlayerRegistry, MAX_RECORDS_PAGE};
use crate::snapshot::{self, AutoSaver, SnapshotError};
use log::{debug, error, info, warn};
use shared::{
    BagItem, BuildingView, Direction, DogView, ErrorCode, LostObject, MapDescription, MapSummary,
    OfficeView, Packet, PlayerRecord, PlayerSummary, RoadView,
};
use std::path::PathBuf;
use std::time::Duration;

/// Where and how often to save the game state
#[derive(Debug, Clone, PartialEq)]
pub struct SaveConfig {
    pub state_file: PathBuf,
    /// Game time between automatic saves; `None` saves on shutdown only
    pub period: Option<Duration>,
}

pub struct Simulation {
    game: Game,
    players: PlayerRegistry,
    /// Ticks come from the server's timer; manual tick requests are refused.
    auto_tick: bool,
    save: Option<SaveConfig>,
    autosaver: Option<AutoSaver>,
}

impl Simulation {
    pub fn new(
        game: Game,
        players: PlayerRegistry,
        auto_tick: bool,
        save: Option<SaveConfig>,
    ) -> Self {
        let autosaver = save
            .as_ref()
            .and_then(|save| save.period)
            .map(AutoSaver::new);

        Self {
            game,
            players,
            auto_tick,
            save,
            autosaver,
        }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    /// Advances the world by `delta`, retires idle dogs and autosaves when due.
    pub fn advance(&mut self, delta: Duration) -> TickSummary {
        let delta_ms = delta.as_millis() as u64;
        let summary = self.game.tick(delta_ms, &mut self.players);

        let retired = self.players.update_activity(&mut self.game, delta);
        if !retired.is_empty() {
            debug!(
                "Retired {} players on tick {}, {} results on the leaderboard",
                retired.len(),
                self.game.tick,
                self.players.all_records().len()
            );
        }

        let save_due = self
            .autosaver
            .as_mut()
            .is_some_and(|saver| saver.on_tick(delta));
        if save_due {
            if let Err(e) = self.save_state() {
                error!("Autosave failed: {}", e);
            }
        }

        summary
    }

    /// Writes the game state to the configured state file, if any.
    pub fn save_state(&self) -> Result<(), SnapshotError> {
        if let Some(save) = &self.save {
            let snapshot = snapshot::capture(&self.game, &self.players);
            snapshot::save_to_file(&snapshot, &save.state_file)?;
        }
        Ok(())
    }

    /// Processes one client request and builds the response
    pub fn handle_request(&mut self, packet: Packet) -> Packet {
        match packet {
            Packet::ListMaps => Packet::Maps {
                maps: self
                    .game
                    .maps()
                    .iter()
                    .map(|map| MapSummary {
                        id: map.id().to_string(),
                        name: map.name().to_string(),
                    })
                    .collect(),
            },

            Packet::GetMap { map_id } => match self.game.find_map(&map_id) {
                Some(map) => Packet::MapDetails {
                    map: describe_map(map),
                },
                None => Packet::error(ErrorCode::MapNotFound, "Map not found"),
            },

            Packet::Join { user_name, map_id } => self.join(&user_name, &map_id),

            Packet::Move { token, direction } => self.move_dog(&token, direction),

            Packet::Tick { time_delta } => {
                if self.auto_tick {
                    return Packet::error(ErrorCode::BadRequest, "Invalid endpoint");
                }
                if time_delta == 0 {
                    return Packet::error(ErrorCode::InvalidArgument, "Failed to parse tick request");
                }
                self.advance(Duration::from_millis(time_delta));
                Packet::Ack
            }

            Packet::GetState { token } => self.state(&token),

            Packet::GetPlayers { token } => self.player_list(&token),

            Packet::GetRecords { start, max_items } => self.records(start, max_items),

            other => {
                warn!("Client sent a response packet: {:?}", other);
                Packet::error(ErrorCode::BadRequest, "Unexpected packet")
            }
        }
    }

    fn join(&mut self, user_name: &str, map_id: &str) -> Packet {
        match self.players.add_player(user_name, &mut self.game, map_id) {
            Ok(player) => Packet::Joined {
                token: player.token.clone(),
                player_id: player.id,
            },
            Err(e) => {
                info!("Join rejected: {}", e);
                let code = match e {
                    JoinError::EmptyName => ErrorCode::InvalidArgument,
                    JoinError::UnknownMap(_) => ErrorCode::MapNotFound,
                    JoinError::ServerFull(_) => ErrorCode::BadRequest,
                };
                Packet::error(code, e.to_string())
            }
        }
    }

    fn move_dog(&mut self, token: &str, direction: Direction) -> Packet {
        let Some(player) = self.players.find_by_token(token) else {
            return unknown_token();
        };

        if self
            .game
            .set_dog_direction(player.session_id, player.id, direction)
        {
            Packet::Ack
        } else {
            unknown_token()
        }
    }

    fn state(&self, token: &str) -> Packet {
        let Some(player) = self.players.find_by_token(token) else {
            return unknown_token();
        };
        let Some(session) = self.game.session(player.session_id) else {
            return unknown_token();
        };

        let players = session
            .dogs()
            .iter()
            .map(|dog| DogView {
                id: dog.id(),
                position: dog.position(),
                speed: dog.speed(),
                direction: dog.direction(),
                bag: dog
                    .bag()
                    .iter()
                    .map(|item| BagItem {
                        id: item.id,
                        type_index: item.item_type.type_index,
                    })
                    .collect(),
                score: self
                    .players
                    .find_by_id(session.id(), dog.id())
                    .map_or(0, |owner| owner.score),
            })
            .collect();

        let lost_objects = session
            .items()
            .iter()
            .map(|item| LostObject {
                id: item.id,
                type_index: item.item_type.type_index,
                position: item.position,
            })
            .collect();

        Packet::State {
            players,
            lost_objects,
        }
    }

    fn player_list(&self, token: &str) -> Packet {
        let Some(player) = self.players.find_by_token(token) else {
            return unknown_token();
        };

        Packet::Players {
            players: self
                .players
                .players_in_session(player.session_id)
                .map(|p| PlayerSummary {
                    id: p.id,
                    name: p.name.clone(),
                })
                .collect(),
        }
    }

    fn records(&self, start: u32, max_items: Option<u32>) -> Packet {
        let max_items = max_items.map_or(MAX_RECORDS_PAGE, |n| n as usize);
        if max_items > MAX_RECORDS_PAGE {
            return Packet::error(
                ErrorCode::InvalidArgument,
                format!("At most {} records per request", MAX_RECORDS_PAGE),
            );
        }

        Packet::Records {
            records: self
                .players
                .records(start as usize, max_items)
                .iter()
                .map(|record| PlayerRecord {
                    name: record.name.clone(),
                    score: record.score,
                    play_time: record.play_time.as_secs_f64(),
                })
                .collect(),
        }
    }
}

fn describe_map(map: &Map) -> MapDescription {
    MapDescription {
        id: map.id().to_string(),
        name: map.name().to_string(),
        roads: map
            .roads()
            .iter()
            .map(|road| {
                let (start, end) = (road.start(), road.end());
                let horizontal = road.is_horizontal();
                RoadView {
                    x0: start.x,
                    y0: start.y,
                    x1: horizontal.then_some(end.x),
                    y1: (!horizontal).then_some(end.y),
                }
            })
            .collect(),
        buildings: map
            .buildings()
            .iter()
            .map(|building| BuildingView {
                x: building.bounds.position.x,
                y: building.bounds.position.y,
                w: building.bounds.size.width,
                h: building.bounds.size.height,
            })
            .collect(),
        offices: map
            .offices()
            .iter()
            .map(|office| OfficeView {
                id: office.id.clone(),
                x: office.position.x,
                y: office.position.y,
                offset_x: office.offset.dx,
                offset_y: office.offset.dy,
            })
            .collect(),
        loot_types: map.loot_type_info().to_string(),
    }
}

fn unknown_token() -> Packet {
    Packet::error(ErrorCode::UnknownToken, "Player token has not been found")
}

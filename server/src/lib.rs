//! # Road Dogs Game Server Library
//!
//! This library provides the authoritative server for a multiplayer game in
//! which dogs run along road networks, pick up lost objects and carry them to
//! offices for score. Clients join a map, steer their dog and query the world;
//! the server owns the only copy of the world and advances it tick by tick.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every tick moves all dogs along their roads, spawns new loot and resolves
//! pickups and deliveries in the order they happened during the tick. Clients
//! never move dogs themselves; they only choose a direction.
//!
//! ### Player Management
//! Handles the lifecycle of players:
//! - Joining a map and receiving an auth token
//! - Steering and state queries authenticated by that token
//! - Retirement of dogs that stand still for too long
//!
//! ### Persistence
//! The whole game can be written to a state file and restored on startup,
//! either on shutdown only or periodically.
//!
//! ## Architecture Design
//!
//! ### Single Event Loop
//! The server processes all network requests and timer ticks sequentially in
//! one loop that owns the game state. No tick overlaps another tick or a
//! request, and every read sees a consistent world.
//!
//! ### UDP-Based Communication
//! Each request is one bincode-encoded datagram and gets exactly one response
//! datagram back.
//!
//! ## Module Organization
//!
//! ### Model Module (`model`)
//! Maps, roads, offices, dogs and the per-map game session, including
//! road-constrained movement.
//!
//! ### Gathering Module (`gathering`)
//! Converts one tick of movement into pickups and deliveries using the
//! collision detector from the `shared` crate.
//!
//! ### Loot Module (`loot`)
//! Decides how many lost objects appear on a map each tick.
//!
//! ### Game Module (`game`)
//! All maps and sessions, and the tick that advances them.
//!
//! ### Players Module (`players`)
//! Tokens, scores and idle retirement.
//!
//! ### Config and Snapshot Modules (`config`, `snapshot`)
//! Loading the JSON game configuration; saving and restoring game state.
//!
//! ### Simulation and Network Modules (`simulation`, `network`)
//! Request handling on top of the game state, and the UDP server loop that
//! feeds it requests and timer ticks.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::load_game;
//! use server::network::Server;
//! use server::players::PlayerRegistry;
//! use server::simulation::Simulation;
//! use std::path::Path;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let game = load_game(Path::new("data/config.json"), false)?;
//!     let simulation = Simulation::new(game, PlayerRegistry::new(64), true, None);
//!
//!     // Tick every 50ms; clients may only join, steer and query
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         simulation,
//!         Some(Duration::from_millis(50)),
//!     ).await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod game;
pub mod gathering;
pub mod loot;
pub mod model;
pub mod network;
pub mod players;
pub mod simulation;
pub mod snapshot;

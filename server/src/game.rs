use crate::gathering::{update_session_items, ScoreSink};
use crate::loot::LootGenerator;
use crate::model::{DogId, GameSession, Map, ModelError, SessionId};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::Direction;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// World-wide settings shared by every session
#[derive(Debug, Clone, PartialEq)]
pub struct GameSettings {
    pub loot_period: Duration,
    pub loot_probability: f64,
    pub random_spawn: bool,
    /// Idle time after which a dog leaves the game
    pub retirement_time: Duration,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            loot_period: Duration::from_secs(5),
            loot_probability: 0.5,
            random_spawn: false,
            retirement_time: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub spawned: usize,
    pub collected: usize,
    pub delivered_items: usize,
    pub scored: u64,
}

/// All maps and the sessions playing on them
pub struct Game {
    pub tick: u64,
    settings: GameSettings,
    maps: Vec<Arc<Map>>,
    map_index: HashMap<String, usize>,
    sessions: Vec<GameSession>,
    next_session_id: SessionId,
    rng: StdRng,
}

impl Game {
    pub fn new(settings: GameSettings) -> Self {
        Self {
            tick: 0,
            settings,
            maps: Vec::new(),
            map_index: HashMap::new(),
            sessions: Vec::new(),
            next_session_id: 1,
            rng: StdRng::from_entropy(),
        }
    }

    /// Makes spawn points and loot placement reproducible.
    pub fn seed_rng(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn add_map(&mut self, map: Map) -> Result<(), ModelError> {
        if self.map_index.contains_key(map.id()) {
            return Err(ModelError::DuplicateMap(map.id().to_string()));
        }
        self.map_index.insert(map.id().to_string(), self.maps.len());
        self.maps.push(Arc::new(map));
        Ok(())
    }

    pub fn maps(&self) -> &[Arc<Map>] {
        &self.maps
    }

    pub fn find_map(&self, id: &str) -> Option<&Arc<Map>> {
        self.map_index.get(id).map(|&idx| &self.maps[idx])
    }

    pub fn sessions(&self) -> &[GameSession] {
        &self.sessions
    }

    pub fn session(&self, id: SessionId) -> Option<&GameSession> {
        self.sessions.iter().find(|session| session.id() == id)
    }

    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut GameSession> {
        self.sessions.iter_mut().find(|session| session.id() == id)
    }

    /// Returns the session playing `map_id`, opening one if needed.
    ///
    /// `None` if no such map is loaded.
    pub fn session_for_map(&mut self, map_id: &str) -> Option<&mut GameSession> {
        if let Some(idx) = self.sessions.iter().position(|s| s.map().id() == map_id) {
            return Some(&mut self.sessions[idx]);
        }

        let id = self.next_session_id;
        self.open_session(id, map_id)
    }

    /// Opens a session with a known id, as when loading saved state.
    pub fn restore_session(&mut self, id: SessionId, map_id: &str) -> Option<&mut GameSession> {
        self.open_session(id, map_id)
    }

    fn open_session(&mut self, id: SessionId, map_id: &str) -> Option<&mut GameSession> {
        let map = Arc::clone(self.find_map(map_id)?);
        let loot = LootGenerator::new(self.settings.loot_period, self.settings.loot_probability);

        info!("Opened session {} on map {}", id, map_id);
        self.next_session_id = self.next_session_id.max(id + 1);
        self.sessions
            .push(GameSession::new(id, map, self.settings.random_spawn, loot));
        self.sessions.last_mut()
    }

    /// Spawns a dog for a new player on `map_id`, returning its session.
    pub fn spawn_dog(&mut self, map_id: &str, dog_id: DogId) -> Option<SessionId> {
        let idx = match self.sessions.iter().position(|s| s.map().id() == map_id) {
            Some(idx) => idx,
            None => {
                self.session_for_map(map_id)?;
                self.sessions.len() - 1
            }
        };

        let session = &mut self.sessions[idx];
        let position = session.spawn_dog(dog_id, &mut self.rng).position();
        info!(
            "Spawned dog {} in session {} at ({:.2}, {:.2})",
            dog_id,
            session.id(),
            position.x,
            position.y
        );
        Some(session.id())
    }

    /// Points a dog in `direction` at its map's speed. Returns false for an unknown dog.
    pub fn set_dog_direction(
        &mut self,
        session_id: SessionId,
        dog_id: DogId,
        direction: Direction,
    ) -> bool {
        let Some(session) = self.session_mut(session_id) else {
            return false;
        };
        let speed = session.map().dog_speed();
        match session.dog_mut(dog_id) {
            Some(dog) => {
                dog.apply_direction(direction, speed);
                true
            }
            None => false,
        }
    }

    pub fn remove_dog(&mut self, session_id: SessionId, dog_id: DogId) {
        if let Some(session) = self.session_mut(session_id) {
            session.remove_dog(dog_id);
        }
    }

    /// Advances every session by `delta_ms`: movement, loot, pickups and deliveries.
    pub fn tick<S>(&mut self, delta_ms: u64, sink: &mut S) -> TickSummary
    where
        S: ScoreSink + ?Sized,
    {
        let mut summary = TickSummary::default();

        for session in &mut self.sessions {
            session.advance_dogs(delta_ms);
            let spawned = session.spawn_loot(delta_ms, &mut self.rng);
            let gathered = update_session_items(session, delta_ms, sink);

            if spawned > 0 || !gathered.is_empty() {
                debug!(
                    "Session {}: spawned {}, collected {}, delivered {} for {} points",
                    session.id(),
                    spawned,
                    gathered.collected,
                    gathered.delivered_items,
                    gathered.scored
                );
            }

            summary.spawned += spawned;
            summary.collected += gathered.collected;
            summary.delivered_items += gathered.delivered_items;
            summary.scored += gathered.scored;
        }

        self.tick += 1;
        summary
    }
}

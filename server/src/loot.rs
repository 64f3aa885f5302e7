//! Loot spawning policy
//!
//! The longer a map goes without new loot, the likelier it is that some
//! appears. The amount spawned covers at most the shortage of lost objects
//! relative to the number of dogs looking for them.

use rand::Rng;
use std::fmt;
use std::time::Duration;

type RandomSource = Box<dyn FnMut() -> f64 + Send>;

pub struct LootGenerator {
    base_interval: Duration,
    probability: f64,
    time_without_loot: Duration,
    random_source: RandomSource,
}

impl LootGenerator {
    /// `probability` is the chance of loot appearing within one `base_interval`.
    pub fn new(base_interval: Duration, probability: f64) -> Self {
        Self::with_random_source(base_interval, probability, || {
            rand::thread_rng().gen_range(0.0..=1.0)
        })
    }

    /// Same as `new`, drawing the random factor (expected in `[0, 1]`) from `source`.
    pub fn with_random_source<F>(base_interval: Duration, probability: f64, source: F) -> Self
    where
        F: FnMut() -> f64 + Send + 'static,
    {
        Self {
            base_interval,
            probability: probability.clamp(0.0, 1.0),
            time_without_loot: Duration::ZERO,
            random_source: Box::new(source),
        }
    }

    /// Returns how many lost objects to spawn after `time_delta` has passed.
    pub fn generate(&mut self, time_delta: Duration, loot_count: usize, looter_count: usize) -> usize {
        self.time_without_loot = self.time_without_loot.saturating_add(time_delta);

        let loot_shortage = looter_count.saturating_sub(loot_count);
        if loot_shortage == 0 || self.base_interval.is_zero() {
            return 0;
        }

        let ratio = self.time_without_loot.as_secs_f64() / self.base_interval.as_secs_f64();
        let probability = ((1.0 - (1.0 - self.probability).powf(ratio)) * (self.random_source)())
            .clamp(0.0, 1.0);
        let generated = (loot_shortage as f64 * probability).round() as usize;

        if generated > 0 {
            self.time_without_loot = Duration::ZERO;
        }
        generated
    }

    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl fmt::Debug for LootGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LootGenerator")
            .field("base_interval", &self.base_interval)
            .field("probability", &self.probability)
            .field("time_without_loot", &self.time_without_loot)
            .finish()
    }
}

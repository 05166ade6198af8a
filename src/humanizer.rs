//! Jittered, vaguely-human timing: delays between actions, occasional long
//! pauses, and village/manager order shuffling.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::config::HumanizerConfig;

pub struct Humanizer {
    config: HumanizerConfig,
}

impl Humanizer {
    pub fn new(config: HumanizerConfig) -> Self {
        Self { config }
    }

    /// Sample a humanized delay in seconds for a labeled action.
    ///
    /// Gaussian around the midpoint of `delay_range`, jittered by
    /// `jitter_factor`, clamped to `[low*0.5, high*1.5]`. With probability
    /// `long_pause_chance`, substitutes a uniform draw from
    /// `long_pause_range` instead.
    pub fn delay(&self, _label: &str) -> f64 {
        let mut rng = rand::thread_rng();
        if rng.gen_range(0.0..1.0) < self.config.long_pause_chance {
            let (low, high) = self.config.long_pause_range;
            return rng.gen_range(low..=high);
        }

        let (low, high) = self.config.delay_range;
        let mean = (low + high) / 2.0;
        let stddev = ((high - low) / 4.0).max(f64::EPSILON);
        let normal = Normal::new(mean, stddev).unwrap_or_else(|_| {
            Normal::new(mean, 1.0).expect("fallback normal distribution must be valid")
        });
        let base = normal.sample(&mut rng);
        let jitter = base * self.config.jitter_factor * rng.gen_range(-1.0..=1.0);
        let sampled = base + jitter;
        sampled.clamp(low * 0.5, high * 1.5)
    }

    /// Sleep for a humanized delay tagged with `label` (used in logging by
    /// callers; the label does not change the distribution).
    pub async fn wait(&self, label: &str) {
        let seconds = self.delay(label);
        tokio::time::sleep(std::time::Duration::from_secs_f64(seconds.max(0.0))).await;
    }

    /// Short wait between micro-actions: uniform in `[0.3, 1.2]` seconds.
    pub async fn short_wait(&self) {
        let seconds = rand::thread_rng().gen_range(0.3..=1.2);
        tokio::time::sleep(std::time::Duration::from_secs_f64(seconds)).await;
    }

    /// Return a freshly shuffled copy of `items`. Never mutates in place,
    /// matching the source's `shuffle_order` returning a new list.
    pub fn shuffle_order<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let mut copy: Vec<T> = items.to_vec();
        copy.shuffle(&mut rand::thread_rng());
        copy
    }

    /// Uniform draw within `(low, high)` seconds, used to jitter cycle
    /// wake-ups.
    pub fn random_cycle_delay(&self, range: (u64, u64)) -> f64 {
        let (low, high) = range;
        if low >= high {
            return low as f64;
        }
        rand::thread_rng().gen_range(low as f64..=high as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn humanizer() -> Humanizer {
        Humanizer::new(HumanizerConfig {
            delay_range: (3.0, 8.0),
            jitter_factor: 0.3,
            long_pause_chance: 0.0,
            long_pause_range: (15.0, 45.0),
        })
    }

    #[test]
    fn delay_stays_within_clamp_bounds() {
        let h = humanizer();
        for _ in 0..200 {
            let d = h.delay("after_building");
            assert!(d >= 1.5 && d <= 12.0, "delay {d} out of clamp range");
        }
    }

    #[test]
    fn shuffle_order_preserves_elements_without_mutating_input() {
        let h = humanizer();
        let original = vec![1, 2, 3, 4, 5];
        let shuffled = h.shuffle_order(&original);
        let mut sorted = shuffled.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, original);
    }

    #[test]
    fn random_cycle_delay_respects_bounds() {
        let h = humanizer();
        for _ in 0..200 {
            let d = h.random_cycle_delay((10, 30));
            assert!((10.0..=30.0).contains(&d));
        }
    }
}

//! All randomness used by the simulator flows through [`RandomSource`].
//!
//! The raw draws come from an [`Entropy`] implementation, so tests can swap
//! the thread-seeded generator for a fixed seed or a scripted sequence.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::clock::Clock;

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A stream of uniform draws in `[0, 1)`.
pub trait Entropy: Send {
    fn next_unit(&mut self) -> f64;
}

/// `StdRng`-backed entropy, either OS-seeded or from a fixed seed.
pub struct SeededEntropy {
    rng: StdRng,
}

impl SeededEntropy {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_os() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Entropy for SeededEntropy {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays a fixed list of draws, then repeats `fallback` forever.
#[derive(Debug, Clone)]
pub struct ScriptedEntropy {
    values: VecDeque<f64>,
    fallback: f64,
}

impl ScriptedEntropy {
    pub fn new(fallback: f64) -> Self {
        Self {
            values: VecDeque::new(),
            fallback: fallback.clamp(0.0, 0.999_999),
        }
    }

    pub fn push(mut self, value: f64) -> Self {
        self.values.push_back(value.clamp(0.0, 0.999_999));
        self
    }

    pub fn repeat(mut self, value: f64, count: usize) -> Self {
        for _ in 0..count {
            self = self.push(value);
        }
        self
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl Entropy for ScriptedEntropy {
    fn next_unit(&mut self) -> f64 {
        self.values.pop_front().unwrap_or(self.fallback)
    }
}

pub struct RandomSource {
    entropy: Box<dyn Entropy>,
    clock: Arc<dyn Clock>,
}

impl RandomSource {
    pub fn new(entropy: Box<dyn Entropy>, clock: Arc<dyn Clock>) -> Self {
        Self { entropy, clock }
    }

    /// Integer in `[min, max]`, both inclusive.
    pub fn uniform_int(&mut self, min: i64, max: i64) -> i64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let span = (hi - lo + 1) as f64;
        let offset = (self.entropy.next_unit() * span).floor() as i64;
        (lo + offset).min(hi)
    }

    /// Float in `[min, max]` rounded to `precision` decimal digits.
    pub fn uniform_float(&mut self, min: f64, max: f64, precision: u32) -> f64 {
        let raw = self.entropy.next_unit() * (max - min) + min;
        let scale = 10f64.powi(precision as i32);
        ((raw * scale).round() / scale).clamp(min.min(max), max.max(min))
    }

    /// `true` with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.entropy.next_unit() < p
    }

    /// Pick one element of `items`.
    ///
    /// Without weights every item is equally likely. With weights, the
    /// weights are normalized by their sum and a single draw is walked down
    /// the cumulative distribution in iteration order; if rounding leaves the
    /// threshold positive after the full pass the last item is returned.
    /// Returns `None` only for an empty slice.
    pub fn weighted_choice<'a, T>(&mut self, items: &'a [T], weights: Option<&[f64]>) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }

        let total: f64 = weights.map(|w| w.iter().sum()).unwrap_or(0.0);
        let weights = match weights {
            Some(w) if total.is_finite() && total > 0.0 => w,
            _ => {
                let idx = (self.entropy.next_unit() * items.len() as f64).floor() as usize;
                return items.get(idx.min(items.len() - 1));
            }
        };

        let mut threshold = self.entropy.next_unit();
        for (item, weight) in items.iter().zip(weights) {
            threshold -= weight / total;
            if threshold <= 0.0 {
                return Some(item);
            }
        }
        items.last()
    }

    /// Instant uniformly distributed between `max_days_ago` days ago and now.
    pub fn past_timestamp(&mut self, max_days_ago: u32) -> DateTime<Utc> {
        let window_ms = f64::from(max_days_ago) * 86_400_000.0;
        let back = (self.entropy.next_unit() * window_ms) as i64;
        self.clock.now() - chrono::Duration::milliseconds(back)
    }

    /// Lowercase alphanumeric token. Collisions are not checked.
    pub fn short_id(&mut self, length: usize) -> String {
        (0..length)
            .map(|_| {
                let idx = (self.entropy.next_unit() * ID_ALPHABET.len() as f64).floor() as usize;
                ID_ALPHABET[idx.min(ID_ALPHABET.len() - 1)] as char
            })
            .collect()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::clock::FakeClock;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn seeded(seed: u64) -> RandomSource {
        RandomSource::new(
            Box::new(SeededEntropy::from_seed(seed)),
            Arc::new(FakeClock::new(fixed_now())),
        )
    }

    fn scripted(entropy: ScriptedEntropy) -> RandomSource {
        RandomSource::new(Box::new(entropy), Arc::new(FakeClock::new(fixed_now())))
    }

    #[test]
    fn test_uniform_int_stays_in_range() {
        let mut rng = seeded(7);
        for _ in 0..5_000 {
            let v = rng.uniform_int(-3, 3);
            assert!((-3..=3).contains(&v), "out of range: {}", v);
        }
    }

    #[test]
    fn test_uniform_int_hits_both_bounds() {
        let mut rng = scripted(ScriptedEntropy::new(0.0).push(0.0).push(0.999_999));
        assert_eq!(rng.uniform_int(10, 20), 10);
        assert_eq!(rng.uniform_int(10, 20), 20);
    }

    #[test]
    fn test_uniform_int_swapped_bounds() {
        let mut rng = scripted(ScriptedEntropy::new(0.0));
        assert_eq!(rng.uniform_int(5, 1), 1);
    }

    #[test]
    fn test_uniform_float_precision_and_range() {
        let mut rng = seeded(11);
        for _ in 0..1_000 {
            let v = rng.uniform_float(85.0, 99.0, 1);
            assert!((85.0..=99.0).contains(&v));
            let scaled = v * 10.0;
            assert!((scaled - scaled.round()).abs() < 1e-6, "not 1dp: {}", v);
        }
    }

    #[test]
    fn test_chance_uses_strict_threshold() {
        let mut rng = scripted(ScriptedEntropy::new(0.5).push(0.09).push(0.10));
        assert!(rng.chance(0.10));
        assert!(!rng.chance(0.10));
        assert!(!rng.chance(0.5));
    }

    #[test]
    fn test_weighted_choice_distribution() {
        let mut rng = seeded(42);
        let items = ['a', 'b'];
        let weights = [0.9, 0.1];
        let draws = 10_000;
        let hits = (0..draws)
            .filter(|_| rng.weighted_choice(&items, Some(&weights)) == Some(&'a'))
            .count();
        let share = hits as f64 / draws as f64;
        assert!(share > 0.85 && share < 0.95, "share of 'a' was {}", share);
    }

    #[test]
    fn test_weighted_choice_normalizes_weights() {
        // 3:1 weights behave like 0.75/0.25.
        let items = ["x", "y"];
        let mut rng = scripted(ScriptedEntropy::new(0.0).push(0.74).push(0.76));
        assert_eq!(rng.weighted_choice(&items, Some(&[3.0, 1.0])), Some(&"x"));
        assert_eq!(rng.weighted_choice(&items, Some(&[3.0, 1.0])), Some(&"y"));
    }

    #[test]
    fn test_weighted_choice_skips_zero_weights() {
        let items = [1, 2, 3];
        let mut rng = scripted(ScriptedEntropy::new(0.0).push(0.5));
        assert_eq!(rng.weighted_choice(&items, Some(&[0.0, 0.0, 1.0])), Some(&3));
    }

    #[test]
    fn test_weighted_choice_zero_total_is_uniform() {
        let items = [1, 2, 3];
        let mut rng = scripted(ScriptedEntropy::new(0.0).push(0.5));
        assert_eq!(rng.weighted_choice(&items, Some(&[0.0, 0.0, 0.0])), Some(&2));
    }

    #[test]
    fn test_weighted_choice_uniform_and_empty() {
        let items = ["p", "q", "r", "s"];
        let mut rng = scripted(ScriptedEntropy::new(0.0).push(0.0).push(0.5).push(0.99));
        assert_eq!(rng.weighted_choice(&items, None), Some(&"p"));
        assert_eq!(rng.weighted_choice(&items, None), Some(&"r"));
        assert_eq!(rng.weighted_choice(&items, None), Some(&"s"));

        let empty: [u8; 0] = [];
        assert_eq!(rng.weighted_choice(&empty, None), None);
    }

    #[test]
    fn test_past_timestamp_window() {
        let mut rng = seeded(3);
        let now = fixed_now();
        for _ in 0..1_000 {
            let ts = rng.past_timestamp(7);
            assert!(ts <= now);
            assert!(ts >= now - chrono::Duration::days(7));
        }
    }

    #[test]
    fn test_short_id_shape() {
        let mut rng = seeded(5);
        let id = rng.short_id(8);
        assert_eq!(id.len(), 8);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = seeded(99);
        let mut b = seeded(99);
        assert_eq!(a.short_id(12), b.short_id(12));
        assert_eq!(a.uniform_int(0, 1_000), b.uniform_int(0, 1_000));
    }

    #[test]
    fn test_scripted_entropy_replays_then_falls_back() {
        let mut entropy = ScriptedEntropy::new(0.25).repeat(0.5, 2);
        assert_eq!(entropy.remaining(), 2);
        assert_eq!(entropy.next_unit(), 0.5);
        assert_eq!(entropy.next_unit(), 0.5);
        assert_eq!(entropy.next_unit(), 0.25);
        assert_eq!(entropy.remaining(), 0);
    }
}

//! Deterministic, position-tracked RNG.
//!
//! The teacher calls `rand::rng()` ad hoc (`npc.rs`, `trigger/condition.rs`)
//! since Amble has no save-reproducibility requirement for randomness.
//! questcore's determinism contract (spec 4.J/8) needs a stream that is a
//! pure function of `(seed)` and that can be fast-forwarded to an exact
//! draw count on load, so this wraps `rand`'s `StdRng` (same crate, just a
//! seedable algorithm) but draws raw `u64`s itself and reduces them,
//! rather than calling `Rng::random_range` for each roll: a range-based
//! draw can consume a variable amount of the underlying stream (rejection
//! sampling), which would make "discard N draws" an inexact replay. One
//! raw `u64` per draw keeps position-counting exact regardless of what
//! range that draw is later reduced into.

use rand::{RngCore, SeedableRng};
use rand::rngs::StdRng;

/// A deterministic RNG that remembers how many draws it has produced.
#[derive(Debug)]
pub struct Rng {
    seed: i64,
    position: i64,
    inner: StdRng,
}

impl Rng {
    /// Construct a fresh stream from `seed`.
    pub fn new(seed: i64) -> Self {
        Rng {
            seed,
            position: 0,
            inner: StdRng::seed_from_u64(seed as u64),
        }
    }

    /// Reconstruct the stream for `seed` and fast-forward past `position`
    /// draws, reproducing the exact point in the stream a prior session had
    /// reached. This is what makes save/load deterministic.
    pub fn restore(seed: i64, position: i64) -> Self {
        let mut rng = Rng::new(seed);
        for _ in 0..position {
            rng.inner.next_u64();
        }
        rng.position = position;
        rng
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    fn draw(&mut self) -> u64 {
        self.position += 1;
        self.inner.next_u64()
    }

    /// Roll a die with `sides` faces, 1-indexed. Counts as one draw.
    pub fn roll(&mut self, sides: u32) -> u32 {
        (self.draw() % u64::from(sides)) as u32 + 1
    }

    /// Select an index from `weights` by walking cumulative weight until a
    /// single draw fits. One draw, one position increment.
    pub fn weighted_select(&mut self, weights: &[u32]) -> usize {
        let total: u32 = weights.iter().sum();
        if total == 0 {
            return 0;
        }
        let mut draw = (self.draw() % u64::from(total)) as u32;
        for (i, w) in weights.iter().enumerate() {
            if draw < *w {
                return i;
            }
            draw -= *w;
        }
        weights.len().saturating_sub(1)
    }
}

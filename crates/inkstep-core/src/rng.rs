//! Injectable random source for hand-drawn jitter.
//!
//! Every component that jitters geometry owns a [`RandomSource`]. Passing a
//! [`SeededRng`] built from a fixed seed makes generated scripts and rendered
//! frames exactly reproducible.

/// Source of uniformly distributed values.
pub trait RandomSource {
    /// Next raw 32-bit value.
    fn next_u32(&mut self) -> u32;

    /// Uniform float in `[0, 1)`.
    fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / (u32::MAX as f64 + 1.0)
    }

    /// Uniform float in `[lo, hi)`.
    fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_f64() * (hi - lo)
    }

    /// Random offset in `[-amount, amount)`.
    fn jitter(&mut self, amount: f64) -> f64 {
        (self.next_f64() * 2.0 - 1.0) * amount
    }
}

/// Seeded xorshift32 generator.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    pub fn new(seed: u32) -> Self {
        // xorshift has a fixed point at zero
        Self { state: mix(seed).max(1) }
    }

    /// Seed from a process-wide counter. Works on every platform including WASM.
    pub fn from_entropy() -> Self {
        Self::new(next_seed())
    }
}

impl Default for SeededRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for SeededRng {
    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }
}

/// Generate a fresh seed from a global counter.
pub fn next_seed() -> u32 {
    use std::sync::atomic::{AtomicU32, Ordering};

    static SEED_COUNTER: AtomicU32 = AtomicU32::new(1);

    mix(SEED_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// splitmix32-style avalanche.
fn mix(value: u32) -> u32 {
    let mut x = value.wrapping_mul(0x9E3779B9);
    x ^= x >> 16;
    x = x.wrapping_mul(0x85EBCA6B);
    x ^= x >> 13;
    x = x.wrapping_mul(0xC2B2AE35);
    x ^= x >> 16;
    x
}

//! Simple random number generator for reproducible weight initialization.
//!
//! This module provides a lightweight xorshift-based PRNG so that layers built
//! from the same seed get identical weights across runs.

/// Simple RNG for reproducibility.
///
/// Uses xorshift algorithm for fast, deterministic random number generation.
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    /// Create a new RNG with explicit seed (if zero, use a fixed value).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 0x9e3779b97f4a7c15 } else { seed };
        Self { state }
    }

    /// Basic xorshift to generate u32.
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 32) as u32
    }

    /// Convert to [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        // 24 bits keep the result strictly below 1.0 after rounding to f32.
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform sample in [low, high).
    pub fn gen_range_f32(&mut self, low: f32, high: f32) -> f32 {
        low + (high - low) * self.next_f32()
    }

    /// Fills `values` with uniform samples in [-limit, limit).
    pub fn fill_uniform(&mut self, values: &mut [f32], limit: f32) {
        for value in values.iter_mut() {
            *value = self.gen_range_f32(-limit, limit);
        }
    }
}

//! Jittered session clock.
//!
//! Every timestamp the recorder stores goes through [`SessionClock::now`],
//! which adds a precomputed signed jitter to the host time and then clamps the
//! step from the previous reading into `[min_step_ms, max_step_ms]`. Readings
//! stay monotonic with bounded steps while exact replay of raw timing fails.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default length of the noise sequence (must be a power of two).
pub const DEFAULT_NOISE_LEN: usize = 4096;

/// Bounds on the step between two consecutive clock readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepBounds {
    pub min_step_ms: f64,
    pub max_step_ms: f64,
}

impl Default for StepBounds {
    fn default() -> Self {
        Self {
            min_step_ms: 8.0,
            max_step_ms: 250.0,
        }
    }
}

/// Clock construction errors.
#[derive(Debug, PartialEq, Eq)]
pub enum ClockError {
    /// Noise sequence length is zero or not a power of two
    InvalidNoiseLength(usize),
}

impl std::fmt::Display for ClockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClockError::InvalidNoiseLength(len) => {
                write!(f, "Noise sequence length {len} is not a power of two")
            }
        }
    }
}

impl std::error::Error for ClockError {}

/// Fixed sequence of signed jitter magnitudes, drawn once per load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingNoiseSequence {
    values: Vec<i32>,
    mask: usize,
}

impl TimingNoiseSequence {
    /// Draw a sequence of `len` values (rounded up to a power of two), each
    /// with magnitude in `[min_ms, max_ms]` and a random sign.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, len: usize, min_ms: u32, max_ms: u32) -> Self {
        let len = len.max(1).next_power_of_two();
        let (lo, hi) = if min_ms <= max_ms {
            (min_ms, max_ms)
        } else {
            (max_ms, min_ms)
        };
        let hi = hi.min(i32::MAX as u32);
        let lo = lo.min(hi);

        let values = (0..len)
            .map(|_| {
                let magnitude = rng.gen_range(lo..=hi) as i32;
                if rng.gen_bool(0.5) {
                    -magnitude
                } else {
                    magnitude
                }
            })
            .collect();

        Self {
            values,
            mask: len - 1,
        }
    }

    /// Build a sequence from explicit values.
    pub fn from_values(values: Vec<i32>) -> Result<Self, ClockError> {
        let len = values.len();
        if len == 0 || !len.is_power_of_two() {
            return Err(ClockError::InvalidNoiseLength(len));
        }
        Ok(Self {
            values,
            mask: len - 1,
        })
    }

    /// Jitter at a cyclic position.
    pub fn get(&self, index: usize) -> i32 {
        self.values[index & self.mask]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }
}

/// Monotonic, jittered clock for one widget.
#[derive(Debug, Clone)]
pub struct SessionClock {
    noise: Arc<TimingNoiseSequence>,
    bounds: StepBounds,
    last_reported: f64,
    calls: usize,
}

impl SessionClock {
    /// Create a clock whose first reference reading is `origin_ms`.
    pub fn new(noise: Arc<TimingNoiseSequence>, bounds: StepBounds, origin_ms: f64) -> Self {
        let min_step_ms = if bounds.min_step_ms.is_finite() {
            bounds.min_step_ms.max(0.0)
        } else {
            0.0
        };
        let max_step_ms = if bounds.max_step_ms.is_finite() {
            bounds.max_step_ms.max(min_step_ms)
        } else {
            min_step_ms
        };

        Self {
            noise,
            bounds: StepBounds {
                min_step_ms,
                max_step_ms,
            },
            last_reported: if origin_ms.is_finite() { origin_ms } else { 0.0 },
            calls: 0,
        }
    }

    /// Produce the next reading for host time `base_ms`.
    pub fn now(&mut self, base_ms: f64) -> f64 {
        let jitter = f64::from(self.noise.get(self.calls));
        self.calls = self.calls.wrapping_add(1);

        let candidate = base_ms + jitter;
        let floor = self.last_reported + self.bounds.min_step_ms;
        let ceiling = self.last_reported + self.bounds.max_step_ms;

        // f64::min/max return the other operand when one side is NaN.
        let next = floor.max(candidate.min(ceiling));
        self.last_reported = next;
        next
    }

    /// Last value handed out (or the origin before the first call).
    pub fn last_reported(&self) -> f64 {
        self.last_reported
    }

    /// Number of readings taken so far.
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn bounds(&self) -> StepBounds {
        self.bounds
    }
}

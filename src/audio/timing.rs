// Audio timing - Sample-counting clock shared with the audio callback

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared audio clock
///
/// The audio callback (or an offline renderer) advances the sample
/// position; everyone else reads it as seconds. Clones share the same
/// position.
#[derive(Clone, Debug)]
pub struct AudioTiming {
    /// Current sample position (incremented by audio callback)
    sample_position: Arc<AtomicU64>,
    sample_rate: f64,
}

impl AudioTiming {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_position: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    /// Get current sample position
    pub fn current_sample(&self) -> u64 {
        self.sample_position.load(Ordering::Relaxed)
    }

    /// Current clock time in seconds
    pub fn current_time(&self) -> f64 {
        self.samples_to_seconds(self.current_sample())
    }

    /// Advance sample position (called from audio callback)
    pub fn advance(&self, frames: usize) {
        self.sample_position
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    /// Nearest sample index for a clock time; negative times map to 0
    pub fn seconds_to_samples(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate).round() as u64
    }

    pub fn samples_to_seconds(&self, samples: u64) -> f64 {
        samples as f64 / self.sample_rate
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

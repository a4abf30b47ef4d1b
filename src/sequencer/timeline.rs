// Timeline - Beat to audio-clock mapping
// Converts between beat positions and timestamps on the audio clock

use crate::error::{Result, SequencerError};
use std::fmt;

/// A position in musical time, in beats from the sequence start
pub type Beat = f64;

/// Tempo in BPM (Beats Per Minute)
///
/// Always finite and strictly positive; construction rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Creates a new tempo
    pub fn new(bpm: f64) -> Result<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(SequencerError::InvalidTempo(bpm));
        }
        Ok(Self { bpm })
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self { bpm: 120.0 }
    }
}

impl TryFrom<f64> for Tempo {
    type Error = SequencerError;

    fn try_from(bpm: f64) -> Result<Self> {
        Self::new(bpm)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Linear mapping between beats and audio-clock timestamps
///
/// `time = reference_time + (beat - reference_beat) * 60 / bpm`
///
/// A timeline is a value: every update (loop wrap, restart, tempo change)
/// builds a new one from the exact reference point of the previous one,
/// so repeated loops never accumulate rounding error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatTimeline {
    tempo: Tempo,
    reference_beat: Beat,
    reference_time: f64,
}

impl BeatTimeline {
    /// Create a timeline where `reference_beat` sounds at `reference_time`
    pub fn new(tempo: Tempo, reference_beat: Beat, reference_time: f64) -> Self {
        Self {
            tempo,
            reference_beat,
            reference_time,
        }
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn beats_per_minute(&self) -> f64 {
        self.tempo.bpm()
    }

    pub fn reference_beat(&self) -> Beat {
        self.reference_beat
    }

    pub fn reference_time(&self) -> f64 {
        self.reference_time
    }

    /// Audio-clock timestamp at which `beat` sounds
    pub fn time_for(&self, beat: Beat) -> f64 {
        self.reference_time + (beat - self.reference_beat) * 60.0 / self.tempo.bpm()
    }

    /// Beat position sounding at audio-clock `time`
    pub fn beat_for(&self, time: f64) -> Beat {
        self.reference_beat + (time - self.reference_time) * self.tempo.bpm() / 60.0
    }

    /// Move the anchor instant forward by `beat_delay` beats (plus `time_delay` seconds)
    ///
    /// The reference beat keeps its value, so after shifting by one loop
    /// length the same beat numbers address the next loop iteration. The new
    /// reference time is computed from this timeline's exact anchor rather
    /// than by adding up beat durations.
    pub fn shifted_by(&self, beat_delay: Beat, time_delay: f64) -> Self {
        Self {
            reference_time: self.time_for(self.reference_beat + beat_delay) + time_delay,
            ..*self
        }
    }

    /// Anchor a fresh timeline at (`reference_time`, `reference_beat`), same tempo
    pub fn restarted_at(&self, reference_time: f64, reference_beat: Beat) -> Self {
        Self {
            reference_beat,
            reference_time,
            ..*self
        }
    }

    /// Switch to `tempo` from `from_beat` onwards
    ///
    /// `time_for(from_beat)` is identical before and after the change; only
    /// beats after the pivot move.
    pub fn retempo_at(&self, tempo: Tempo, from_beat: Beat) -> Self {
        Self {
            tempo,
            reference_beat: from_beat,
            reference_time: self.time_for(from_beat),
        }
    }
}

impl fmt::Display for BeatTimeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "beat {:.3} @ {:.3}s ({})",
            self.reference_beat, self.reference_time, self.tempo
        )
    }
}

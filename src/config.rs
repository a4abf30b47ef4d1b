// Sequencer configuration - Scheduling constants, loadable from RON

use crate::error::{Result, SequencerError};
use crate::sequencer::timeline::Beat;
use crate::synth::oscillator::WaveformType;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};

/// Tunables for the lookahead scheduler
///
/// Missing fields fall back to their defaults when loading, so a config
/// file only needs to list what it changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Period of the scheduling tick, in milliseconds
    pub schedule_interval_ms: u64,
    /// How far past the audio clock each tick schedules, in seconds
    pub lookahead_seconds: f64,
    /// Beats after which playback wraps to beat 0
    pub loop_length: Beat,
    /// Waveform used for every scheduled tone
    pub waveform: WaveformType,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            schedule_interval_ms: 25,
            lookahead_seconds: 0.1,
            loop_length: 8.0,
            waveform: WaveformType::Sine,
        }
    }
}

impl SequencerConfig {
    /// Parse and validate a RON document
    pub fn from_ron(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(self, PrettyConfig::default())?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schedule_interval_ms == 0 {
            return Err(SequencerError::InvalidConfig(
                "schedule_interval_ms must be > 0".to_string(),
            ));
        }

        if !self.lookahead_seconds.is_finite() || self.lookahead_seconds < 0.0 {
            return Err(SequencerError::InvalidConfig(format!(
                "lookahead_seconds must be finite and >= 0, got {}",
                self.lookahead_seconds
            )));
        }

        if !self.loop_length.is_finite() || self.loop_length <= 0.0 {
            return Err(SequencerError::InvalidConfig(format!(
                "loop_length must be finite and > 0, got {}",
                self.loop_length
            )));
        }

        Ok(())
    }
}

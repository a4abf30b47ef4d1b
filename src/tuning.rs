// Tuning - Note number to frequency lookup

use crate::error::{Result, SequencerError};

/// Maps integer note numbers to frequencies in Hz
///
/// Must be total: every `i32` gets a frequency.
pub trait FrequencySource {
    fn frequency_of(&self, note_number: i32) -> f64;
}

impl<F> FrequencySource for F
where
    F: Fn(i32) -> f64,
{
    fn frequency_of(&self, note_number: i32) -> f64 {
        self(note_number)
    }
}

/// Periodic scale: ratios within one octave above a base frequency
///
/// Note 0 is the base frequency. Note numbers past the last ratio continue
/// in the next octave up, negative ones descend below the base.
#[derive(Debug, Clone, PartialEq)]
pub struct Scale {
    base_frequency: f64,
    ratios: Vec<f64>,
}

impl Scale {
    /// `steps` equal divisions of the octave
    pub fn equal_temperament(steps: u32, base_frequency: f64) -> Result<Self> {
        if steps == 0 {
            return Err(SequencerError::InvalidConfig(
                "equal temperament needs at least one step".to_string(),
            ));
        }
        let ratios = (0..steps)
            .map(|step| 2f64.powf(step as f64 / steps as f64))
            .collect();
        Self::from_ratios(ratios, base_frequency)
    }

    /// Ratios must start at 1.0, be strictly increasing and stay below 2.0
    pub fn from_ratios(ratios: Vec<f64>, base_frequency: f64) -> Result<Self> {
        if !base_frequency.is_finite() || base_frequency <= 0.0 {
            return Err(SequencerError::InvalidConfig(format!(
                "base frequency must be finite and > 0, got {}",
                base_frequency
            )));
        }

        match ratios.first() {
            Some(first) if *first == 1.0 => {}
            _ => {
                return Err(SequencerError::InvalidConfig(
                    "scale ratios must start at 1.0".to_string(),
                ));
            }
        }

        let increasing = ratios.windows(2).all(|pair| pair[0] < pair[1]);
        let below_octave = ratios.iter().all(|r| r.is_finite() && *r < 2.0);
        if !increasing || !below_octave {
            return Err(SequencerError::InvalidConfig(format!(
                "scale ratios must increase within [1.0, 2.0): {:?}",
                ratios
            )));
        }

        Ok(Self {
            base_frequency,
            ratios,
        })
    }

    pub fn base_frequency(&self) -> f64 {
        self.base_frequency
    }

    /// Notes per octave
    pub fn steps(&self) -> usize {
        self.ratios.len()
    }
}

impl Default for Scale {
    /// 12-tone equal temperament with note 0 at A4 (440 Hz)
    fn default() -> Self {
        let ratios = (0..12).map(|step| 2f64.powf(step as f64 / 12.0)).collect();
        Self {
            base_frequency: 440.0,
            ratios,
        }
    }
}

impl FrequencySource for Scale {
    fn frequency_of(&self, note_number: i32) -> f64 {
        let steps = self.ratios.len() as i32;
        let degree = note_number.rem_euclid(steps) as usize;
        let octave = note_number.div_euclid(steps);
        self.base_frequency * self.ratios[degree] * 2f64.powi(octave)
    }
}

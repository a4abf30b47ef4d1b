// Oscillators - Waveform generators for scheduled tones

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveformType {
    #[default]
    Sine,
    Square,
    Saw,
    Triangle,
}

impl WaveformType {
    /// Value of the waveform at `phase` in [0, 1), in [-1, 1]
    pub fn sample_at(self, phase: f32) -> f32 {
        match self {
            WaveformType::Sine => (phase * 2.0 * PI).sin(),
            WaveformType::Square => {
                if phase < 0.5 { 1.0 } else { -1.0 }
            }
            WaveformType::Saw => (phase * 2.0) - 1.0,
            WaveformType::Triangle => {
                if phase < 0.5 {
                    (phase * 4.0) - 1.0
                } else {
                    3.0 - (phase * 4.0)
                }
            }
        }
    }
}

/// Fixed-frequency phase accumulator
#[derive(Clone, Debug)]
pub struct SimpleOscillator {
    waveform: WaveformType,
    phase: f32,
    phase_increment: f32,
}

impl SimpleOscillator {
    pub fn new(waveform: WaveformType, frequency: f64, sample_rate: f64) -> Self {
        Self {
            waveform,
            phase: 0.0,
            phase_increment: (frequency / sample_rate) as f32,
        }
    }

    pub fn waveform(&self) -> WaveformType {
        self.waveform
    }

    pub fn next_sample(&mut self) -> f32 {
        let sample = self.waveform.sample_at(self.phase);

        self.phase += self.phase_increment;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }

        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f64 = 44100.0;
    const EPSILON: f32 = 0.001;

    const ALL_WAVEFORMS: [WaveformType; 4] = [
        WaveformType::Sine,
        WaveformType::Square,
        WaveformType::Saw,
        WaveformType::Triangle,
    ];

    #[test]
    fn test_sine_starts_at_zero() {
        let mut osc = SimpleOscillator::new(WaveformType::Sine, 440.0, SAMPLE_RATE);
        assert!(osc.next_sample().abs() < EPSILON);
    }

    #[test]
    fn test_waveforms_stay_in_range() {
        for waveform in ALL_WAVEFORMS {
            let mut osc = SimpleOscillator::new(waveform, 440.0, SAMPLE_RATE);
            for _ in 0..10_000 {
                let sample = osc.next_sample();
                assert!(
                    (-1.0..=1.0).contains(&sample),
                    "{:?} sample out of range: {}",
                    waveform,
                    sample
                );
            }
        }
    }

    #[test]
    fn test_phase_wraps_above_nyquist() {
        let mut osc = SimpleOscillator::new(WaveformType::Saw, SAMPLE_RATE * 1.5, SAMPLE_RATE);
        for _ in 0..1000 {
            osc.next_sample();
            assert!(osc.phase >= 0.0 && osc.phase < 1.0, "Phase out of range: {}", osc.phase);
        }
    }

    #[test]
    fn test_square_wave_values() {
        assert_eq!(WaveformType::Square.sample_at(0.25), 1.0);
        assert_eq!(WaveformType::Square.sample_at(0.75), -1.0);
    }

    #[test]
    fn test_triangle_peaks() {
        assert!((WaveformType::Triangle.sample_at(0.0) + 1.0).abs() < EPSILON);
        assert!((WaveformType::Triangle.sample_at(0.5) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_waveform_serde_names() {
        let parsed: WaveformType = ron::from_str("triangle").unwrap();
        assert_eq!(parsed, WaveformType::Triangle);
    }
}

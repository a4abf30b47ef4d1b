// Audio output - Interface between the scheduler and a sound-producing clock

use crate::synth::oscillator::WaveformType;

/// A tone to be played between two audio-clock timestamps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledTone {
    pub waveform: WaveformType,
    /// Frequency in Hz
    pub frequency: f64,
    /// Audio-clock time (seconds) at which the tone starts
    pub start_time: f64,
    /// Audio-clock time (seconds) at which the tone stops
    pub stop_time: f64,
}

impl ScheduledTone {
    pub fn duration(&self) -> f64 {
        self.stop_time - self.start_time
    }
}

/// An audio service with its own precise clock
///
/// The scheduler never produces sound itself: it reads `current_time` and
/// queues tones at absolute future timestamps in the same time base.
pub trait AudioOutput {
    /// Current audio-clock time in seconds (monotonic)
    fn current_time(&self) -> f64;

    /// Queue a tone for playback
    fn schedule_tone(&mut self, tone: ScheduledTone);

    /// Drop tones starting at or after `time` and end sounding tones at `time`
    fn cancel_from(&mut self, time: f64);
}

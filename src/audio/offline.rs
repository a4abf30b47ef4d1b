// Offline output - Audio output with an explicitly advanced clock
//
// Time only moves when the caller advances or renders, which makes
// scheduling deterministic for tests and faster-than-realtime bounces.

use crate::audio::output::{AudioOutput, ScheduledTone};
use crate::audio::timing::AudioTiming;
use crate::synth::tone::ToneMixer;

/// Audio output that records tones and renders them on demand
#[derive(Debug, Clone)]
pub struct OfflineOutput {
    timing: AudioTiming,
    mixer: ToneMixer,
    tones: Vec<ScheduledTone>,
    log_tones: bool,
    dropped: usize,
}

impl OfflineOutput {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            timing: AudioTiming::new(sample_rate),
            mixer: ToneMixer::new(sample_rate),
            tones: Vec::new(),
            log_tones: true,
            dropped: 0,
        }
    }

    /// Clock handle; clones share the position
    pub fn timing(&self) -> AudioTiming {
        self.timing.clone()
    }

    /// Move the clock forward without producing audio
    pub fn advance(&mut self, seconds: f64) {
        let frames = self.timing.seconds_to_samples(seconds);
        self.advance_frames(frames as usize);
    }

    pub fn advance_frames(&mut self, frames: usize) {
        self.timing.advance(frames);
        self.mixer.prune(self.timing.current_sample());
    }

    /// Render `frames` mono samples from the current position, advancing the clock
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        let mut buffer = vec![0.0; frames];
        self.mixer.render(self.timing.current_sample(), &mut buffer);
        self.timing.advance(frames);
        buffer
    }

    /// Turn the tone log on or off; playback is unaffected
    ///
    /// Disabling it also clears what was recorded so far.
    pub fn set_tone_log(&mut self, enabled: bool) {
        self.log_tones = enabled;
        if !enabled {
            self.tones = Vec::new();
        }
    }

    /// Every tone scheduled so far, as adjusted by cancellations
    ///
    /// The log grows with every scheduled tone until it is drained with
    /// `take_scheduled_tones` or switched off with `set_tone_log(false)`.
    pub fn scheduled_tones(&self) -> &[ScheduledTone] {
        &self.tones
    }

    /// Drain the tone log, leaving playback state alone
    pub fn take_scheduled_tones(&mut self) -> Vec<ScheduledTone> {
        std::mem::take(&mut self.tones)
    }

    /// Tones the mixer had no room for
    pub fn dropped_tones(&self) -> usize {
        self.dropped
    }
}

impl AudioOutput for OfflineOutput {
    fn current_time(&self) -> f64 {
        self.timing.current_time()
    }

    fn schedule_tone(&mut self, tone: ScheduledTone) {
        if self.log_tones {
            self.tones.push(tone);
        }
        if !self.mixer.schedule(tone) {
            self.dropped += 1;
            log::warn!("Offline mixer full, dropping tone at {:.3}s", tone.start_time);
        }
    }

    fn cancel_from(&mut self, time: f64) {
        self.tones.retain(|t| t.start_time < time);
        for tone in self.tones.iter_mut() {
            tone.stop_time = tone.stop_time.min(time);
        }
        self.mixer.cancel_from(time);
    }
}

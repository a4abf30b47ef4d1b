// Tone mixer - Renders scheduled tones at their sample positions
//
// Shared by the real-time backend and the offline renderer. The voice list
// is pre-allocated and bounded so the real-time path never allocates.

use crate::audio::output::ScheduledTone;
use crate::synth::oscillator::SimpleOscillator;

/// Maximum number of tones queued or sounding at once
pub const MAX_TONES: usize = 64;

/// Attack/release ramp length, to avoid clicks at tone boundaries
const RAMP_SECONDS: f64 = 0.005;

/// Per-tone gain, leaves headroom for a few overlapping tones
const TONE_GAIN: f32 = 0.2;

/// Messages sent to whoever owns the mixer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToneCommand {
    Schedule(ScheduledTone),
    CancelFrom(f64),
}

#[derive(Debug, Clone)]
struct ToneVoice {
    start: u64,
    stop: u64,
    oscillator: SimpleOscillator,
}

/// Set of pending and sounding tones, addressed in sample positions
#[derive(Debug, Clone)]
pub struct ToneMixer {
    sample_rate: f64,
    ramp_samples: f32,
    voices: Vec<ToneVoice>,
}

impl ToneMixer {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ramp_samples: (RAMP_SECONDS * sample_rate).max(1.0) as f32,
            voices: Vec::with_capacity(MAX_TONES),
        }
    }

    /// Apply a command; returns false if a tone had to be dropped
    pub fn handle(&mut self, command: ToneCommand) -> bool {
        match command {
            ToneCommand::Schedule(tone) => self.schedule(tone),
            ToneCommand::CancelFrom(time) => {
                self.cancel_from(time);
                true
            }
        }
    }

    /// Queue a tone; returns false if the mixer is full
    pub fn schedule(&mut self, tone: ScheduledTone) -> bool {
        if self.voices.len() >= MAX_TONES {
            return false;
        }

        let start = self.to_samples(tone.start_time);
        let stop = self.to_samples(tone.stop_time).max(start);
        self.voices.push(ToneVoice {
            start,
            stop,
            oscillator: SimpleOscillator::new(tone.waveform, tone.frequency, self.sample_rate),
        });
        true
    }

    pub fn cancel_from(&mut self, time: f64) {
        let at = self.to_samples(time);
        self.voices.retain(|v| v.start < at);
        for voice in self.voices.iter_mut() {
            voice.stop = voice.stop.min(at);
        }
    }

    /// Mixed mono sample at `position`
    pub fn next_sample(&mut self, position: u64) -> f32 {
        let ramp = self.ramp_samples;
        let mut mix = 0.0;

        for voice in self.voices.iter_mut() {
            if position < voice.start || position >= voice.stop {
                continue;
            }
            let attack = (position - voice.start) as f32 / ramp;
            let release = (voice.stop - position) as f32 / ramp;
            let envelope = attack.min(release).min(1.0);

            mix += voice.oscillator.next_sample() * envelope * TONE_GAIN;
        }

        mix
    }

    /// Render consecutive samples starting at `position`, then drop finished tones
    pub fn render(&mut self, position: u64, output: &mut [f32]) {
        for (offset, sample) in output.iter_mut().enumerate() {
            *sample = self.next_sample(position + offset as u64);
        }
        self.prune(position + output.len() as u64);
    }

    /// Forget tones that stop at or before `position`
    pub fn prune(&mut self, position: u64) {
        self.voices.retain(|v| v.stop > position);
    }

    /// Number of tones not yet finished
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    fn to_samples(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate).round() as u64
    }
}

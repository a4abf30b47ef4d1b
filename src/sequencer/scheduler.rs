// Scheduler - Lookahead note scheduling against an audio clock
//
// A periodic tick converts the next slice of the beat timeline into
// absolute audio-clock timestamps and hands the notes in that slice to the
// audio output ahead of time. Tick jitter only changes how early a tone is
// queued, never when it sounds.

use std::thread;
use std::time::{Duration, Instant};

use crate::audio::output::{AudioOutput, ScheduledTone};
use crate::config::SequencerConfig;
use crate::error::Result;
use crate::sequencer::sequence::SharedSequence;
use crate::sequencer::timeline::{Beat, BeatTimeline, Tempo};
use crate::sequencer::transport::{TransportState, TransportTask};
use crate::timer::{TimerId, TimerQueue};
use crate::tuning::FrequencySource;

/// Longest sleep between two host-loop iterations in `run_realtime`
const MAX_IDLE_SECONDS: f64 = 0.005;

/// Plays a shared note sequence in a loop through an audio output
///
/// `beat_number` is the first beat not yet handed to the output. All
/// transport operations take a delay measured on the audio clock; a zero
/// delay applies immediately, anything else is queued and applied by
/// `run_pending` once due.
pub struct Sequencer<O: AudioOutput, F: FrequencySource> {
    config: SequencerConfig,
    timeline: BeatTimeline,
    sequence: SharedSequence,
    scale: F,
    output: O,
    timers: TimerQueue<TransportTask>,
    state: TransportState,
    beat_number: Beat,
    resume_beat: Beat,
    schedule_timer: Option<TimerId>,
    /// Timelines replaced by tempo changes whose pivot has not sounded yet,
    /// each with the audio-clock time it stays in effect until
    pending_tempo: Vec<(BeatTimeline, f64)>,
}

impl<O: AudioOutput, F: FrequencySource> Sequencer<O, F> {
    /// Create a stopped sequencer with the default configuration
    pub fn new(scale: F, tempo_bpm: f64, output: O, sequence: SharedSequence) -> Result<Self> {
        Self::with_config(scale, tempo_bpm, output, sequence, SequencerConfig::default())
    }

    pub fn with_config(
        scale: F,
        tempo_bpm: f64,
        output: O,
        sequence: SharedSequence,
        config: SequencerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let tempo = Tempo::new(tempo_bpm)?;
        let timeline = BeatTimeline::new(tempo, 0.0, output.current_time());

        log::debug!("Sequencer created: {}, loop of {} beats", tempo, config.loop_length);

        Ok(Self {
            config,
            timeline,
            sequence,
            scale,
            output,
            timers: TimerQueue::new(),
            state: TransportState::Stopped,
            beat_number: 0.0,
            resume_beat: 0.0,
            schedule_timer: None,
            pending_tempo: Vec::new(),
        })
    }

    /// Start (or resume) playback after `delay`
    ///
    /// Ignored if the sequencer is already playing when the delay expires.
    pub fn play(&mut self, delay: Duration) {
        self.run_after(delay, TransportTask::Play);
    }

    /// Pause after `delay`, remembering the beat to resume from
    ///
    /// Ignored unless the sequencer is playing when the delay expires.
    pub fn pause(&mut self, delay: Duration) {
        self.run_after(delay, TransportTask::Pause);
    }

    /// Stop after `delay` and rewind to beat 0
    pub fn stop(&mut self, delay: Duration) {
        self.run_after(delay, TransportTask::Stop);
    }

    /// Change tempo from the next unscheduled beat onwards
    ///
    /// Tones already handed to the output keep their timestamps. An invalid
    /// tempo leaves the timeline untouched.
    pub fn change_tempo(&mut self, bpm: f64) -> Result<()> {
        let tempo = Tempo::new(bpm).inspect_err(|e| log::warn!("Tempo change rejected: {}", e))?;

        // Tones up to the pivot are already queued at the old tempo
        if self.state.is_playing() {
            let now = self.output.current_time();
            let pivot_time = self.timeline.time_for(self.beat_number);
            self.pending_tempo.retain(|(_, until)| *until > now);
            if pivot_time > now {
                self.pending_tempo.push((self.timeline, pivot_time));
            }
        }

        self.timeline = self.timeline.retempo_at(tempo, self.beat_number);
        log::debug!("Tempo changed at beat {:.3}: {}", self.beat_number, self.timeline);
        Ok(())
    }

    /// Current tempo in BPM
    pub fn tempo(&self) -> f64 {
        self.timeline.beats_per_minute()
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// First beat not yet scheduled
    pub fn beat_number(&self) -> Beat {
        self.beat_number
    }

    /// Beat playback resumes from on the next `play`
    pub fn resume_beat(&self) -> Beat {
        self.resume_beat
    }

    /// Beat currently sounding, within `[0, loop_length)`
    pub fn playhead(&self) -> Beat {
        if !self.state.is_playing() {
            return self.resume_beat;
        }
        self.sounding_beat(self.output.current_time())
    }

    pub fn timeline(&self) -> BeatTimeline {
        self.timeline
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn sequence(&self) -> &SharedSequence {
        &self.sequence
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Run one scheduling tick
    ///
    /// Hands every note starting in `[beat_number, window_end)` to the
    /// output, where `window_end` is the beat sounding one lookahead past
    /// the audio clock. When the window crosses the loop boundary the part
    /// before it is scheduled first, then the timeline shifts by one loop
    /// and the remainder is scheduled from beat 0.
    pub fn schedule_notes(&mut self) {
        let now = self.output.current_time();
        let mut window_end = self.timeline.beat_for(now + self.config.lookahead_seconds);

        if window_end <= self.beat_number {
            log::trace!(
                "Nothing to schedule: window end {:.3} <= cursor {:.3}",
                window_end,
                self.beat_number
            );
            return;
        }

        let loop_length = self.config.loop_length;
        while window_end >= loop_length {
            self.schedule_range(self.beat_number, loop_length);
            self.timeline = self.timeline.shifted_by(loop_length, 0.0);
            self.beat_number = 0.0;
            window_end -= loop_length;
            log::trace!("Loop wrapped: {}", self.timeline);
        }

        self.schedule_range(self.beat_number, window_end);
        self.beat_number = window_end;
    }

    /// Apply every task due on the audio clock; returns how many ran
    pub fn run_pending(&mut self) -> usize {
        let now = self.output.current_time();
        let mut fired = 0;
        while let Some(task) = self.timers.pop_due(now) {
            self.dispatch(task);
            fired += 1;
        }
        fired
    }

    /// Audio-clock time of the next queued task
    pub fn next_deadline(&self) -> Option<f64> {
        self.timers.next_deadline()
    }

    /// Drive the host loop on the calling thread for `duration` of wall time
    ///
    /// Only useful with an output whose clock runs on its own, such as
    /// `CpalOutput`.
    pub fn run_realtime(&mut self, duration: Duration) {
        let started = Instant::now();
        while started.elapsed() < duration {
            self.run_pending();

            let now = self.output.current_time();
            let idle = self
                .next_deadline()
                .map(|deadline| (deadline - now).clamp(0.0, MAX_IDLE_SECONDS))
                .unwrap_or(MAX_IDLE_SECONDS);
            thread::sleep(Duration::from_secs_f64(idle.max(0.001)));
        }
    }

    fn run_after(&mut self, delay: Duration, task: TransportTask) {
        if delay.is_zero() {
            self.dispatch(task);
            return;
        }

        let now = self.output.current_time();
        let delay_ms = delay.as_millis() as u64;
        self.timers.set_timeout(now, delay_ms, task);
        log::debug!("{:?} queued for {:.3}s", task, now + delay.as_secs_f64());
    }

    fn dispatch(&mut self, task: TransportTask) {
        match task {
            TransportTask::ScheduleNotes => {
                if self.state.is_playing() {
                    self.schedule_notes();
                }
            }
            TransportTask::Play => self.start_playback(),
            TransportTask::Pause => self.pause_playback(),
            TransportTask::Stop => self.stop_playback(),
        }
    }

    fn start_playback(&mut self) {
        if self.state.is_playing() {
            log::debug!("Play ignored: already playing");
            return;
        }

        let now = self.output.current_time();
        self.timeline = self.timeline.restarted_at(now, self.resume_beat);
        self.pending_tempo.clear();
        self.beat_number = self.resume_beat;
        self.state = TransportState::Playing;
        log::debug!("Playing from beat {:.3}: {}", self.resume_beat, self.timeline);

        self.schedule_notes();
        self.schedule_timer = Some(self.timers.set_interval(
            now,
            self.config.schedule_interval_ms,
            TransportTask::ScheduleNotes,
        ));
    }

    fn pause_playback(&mut self) {
        if !self.state.is_playing() {
            log::debug!("Pause ignored: sequencer is {}", self.state);
            return;
        }

        if let Some(id) = self.schedule_timer.take() {
            self.timers.clear(id);
        }

        let now = self.output.current_time();
        let resume_beat = self.sounding_beat(now);
        self.pending_tempo.clear();

        self.output.cancel_from(now);
        self.resume_beat = resume_beat;
        self.beat_number = resume_beat;
        self.state = TransportState::Paused;
        log::debug!("Paused at beat {:.3}", resume_beat);
    }

    fn stop_playback(&mut self) {
        if self.state.is_playing() {
            self.pause_playback();
        }
        self.beat_number = 0.0;
        self.resume_beat = 0.0;
        self.state = TransportState::Stopped;
        log::debug!("Stopped");
    }

    /// Beat audible at `time`, within `[0, loop_length)`
    ///
    /// Before a pending tempo pivot the queued tones still follow the
    /// timeline that was current when they were scheduled. Just after a
    /// wrap the timeline already addresses the next loop, so the raw beat
    /// can be negative.
    fn sounding_beat(&self, time: f64) -> Beat {
        let timeline = self
            .pending_tempo
            .iter()
            .find(|(_, until)| time < *until)
            .map(|(timeline, _)| *timeline)
            .unwrap_or(self.timeline);
        self.wrap_beat(timeline.beat_for(time))
    }

    /// Fold a beat into `[0, loop_length)`
    fn wrap_beat(&self, beat: Beat) -> Beat {
        let wrapped = beat.rem_euclid(self.config.loop_length);
        // rem_euclid of a tiny negative value can round up to the divisor
        if wrapped >= self.config.loop_length {
            0.0
        } else {
            wrapped
        }
    }

    fn schedule_range(&mut self, start: Beat, end: Beat) {
        let sequence = self.sequence.borrow();
        for note in sequence.get_notes(start, end) {
            let tone = ScheduledTone {
                waveform: self.config.waveform,
                frequency: self.scale.frequency_of(note.number()),
                start_time: self.timeline.time_for(note.start()),
                stop_time: self.timeline.time_for(note.end()),
            };
            log::trace!(
                "Note {} (#{}) at {:.4}s-{:.4}s, {:.2} Hz",
                note.id(),
                note.number(),
                tone.start_time,
                tone.stop_time,
                tone.frequency
            );
            self.output.schedule_tone(tone);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::offline::OfflineOutput;
    use crate::error::SequencerError;
    use crate::sequencer::note::Note;
    use crate::sequencer::sequence::NoteSequence;
    use crate::tuning::Scale;

    const SAMPLE_RATE: f64 = 48000.0;
    const EPSILON: f64 = 1e-9;

    fn sequence_with(notes: &[(Beat, Beat, i32)]) -> SharedSequence {
        let sequence = NoteSequence::new_shared();
        for &(start, length, number) in notes {
            sequence
                .borrow_mut()
                .add_note(Note::new(start, length, number).unwrap());
        }
        sequence
    }

    fn sequencer(bpm: f64, notes: &[(Beat, Beat, i32)]) -> Sequencer<OfflineOutput, Scale> {
        Sequencer::new(
            Scale::default(),
            bpm,
            OfflineOutput::new(SAMPLE_RATE),
            sequence_with(notes),
        )
        .unwrap()
    }

    fn step(seq: &mut Sequencer<OfflineOutput, Scale>, seconds: f64) {
        seq.output_mut().advance(seconds);
        seq.run_pending();
    }

    #[test]
    fn test_rejects_invalid_tempo() {
        let result = Sequencer::new(
            Scale::default(),
            0.0,
            OfflineOutput::new(SAMPLE_RATE),
            NoteSequence::new_shared(),
        );
        assert!(matches!(result, Err(SequencerError::InvalidTempo(_))));
    }

    #[test]
    fn test_first_tick_at_144_bpm() {
        let mut seq = sequencer(144.0, &[(0.0, 2.0, 0), (2.0, 2.0, 1)]);
        seq.play(Duration::ZERO);

        let tones = seq.output().scheduled_tones();
        assert_eq!(tones.len(), 1);
        assert_eq!(tones[0].start_time, 0.0);
        assert!((tones[0].stop_time - 2.0 * 60.0 / 144.0).abs() < EPSILON);
        assert!((tones[0].frequency - 440.0).abs() < EPSILON);

        // 0.1s at 144 BPM
        assert!((seq.beat_number() - 0.24).abs() < EPSILON);
        assert!(seq.is_playing());
    }

    #[test]
    fn test_second_tick_without_clock_progress_is_empty() {
        let mut seq = sequencer(120.0, &[(0.0, 1.0, 0)]);
        seq.play(Duration::ZERO);
        let cursor = seq.beat_number();

        seq.schedule_notes();
        assert_eq!(seq.beat_number(), cursor);
        assert_eq!(seq.output().scheduled_tones().len(), 1);
    }

    #[test]
    fn test_pause_then_play_resumes_from_pause_beat() {
        let mut seq = sequencer(120.0, &[(0.0, 1.0, 0), (1.5, 1.0, 1)]);
        seq.play(Duration::ZERO);
        step(&mut seq, 0.5);

        seq.pause(Duration::ZERO);
        assert_eq!(seq.state(), TransportState::Paused);
        assert!((seq.resume_beat() - 1.0).abs() < EPSILON);
        assert_eq!(seq.beat_number(), seq.resume_beat());

        step(&mut seq, 1.0);
        seq.play(Duration::ZERO);
        assert!((seq.timeline().time_for(1.0) - 1.5).abs() < EPSILON);

        step(&mut seq, 0.2);
        let tones = seq.output().scheduled_tones();
        let last = tones.last().unwrap();
        assert!((last.start_time - 1.75).abs() < EPSILON);
    }

    #[test]
    fn test_pause_cancels_queued_tones() {
        let mut seq = sequencer(120.0, &[(0.0, 1.0, 0), (0.1, 1.0, 1)]);
        seq.play(Duration::ZERO);
        assert_eq!(seq.output().scheduled_tones().len(), 2);

        seq.output_mut().advance(0.02);
        seq.pause(Duration::ZERO);

        let tones = seq.output().scheduled_tones();
        assert_eq!(tones.len(), 1);
        assert!((tones[0].stop_time - 0.02).abs() < EPSILON);

        // The cancelled note is picked up again on resume
        seq.play(Duration::ZERO);
        let tones = seq.output().scheduled_tones();
        assert_eq!(tones.len(), 2);
        assert!((tones[1].start_time - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_play_while_playing_is_ignored() {
        let mut seq = sequencer(120.0, &[]);
        seq.play(Duration::ZERO);
        step(&mut seq, 0.3);

        let timeline = seq.timeline();
        seq.play(Duration::ZERO);
        assert_eq!(seq.timeline(), timeline);
    }

    #[test]
    fn test_pause_when_not_playing_is_ignored() {
        let mut seq = sequencer(120.0, &[]);
        seq.pause(Duration::ZERO);
        assert_eq!(seq.state(), TransportState::Stopped);
        assert_eq!(seq.resume_beat(), 0.0);
    }

    #[test]
    fn test_stop_resets_cursor() {
        let mut seq = sequencer(120.0, &[(0.0, 1.0, 0)]);
        seq.play(Duration::ZERO);
        step(&mut seq, 1.0);

        seq.stop(Duration::ZERO);
        assert_eq!(seq.state(), TransportState::Stopped);
        assert_eq!(seq.beat_number(), 0.0);
        assert_eq!(seq.resume_beat(), 0.0);
        assert!(seq.next_deadline().is_none());

        // From paused too
        seq.play(Duration::ZERO);
        step(&mut seq, 0.5);
        seq.pause(Duration::ZERO);
        assert!(seq.resume_beat() > 0.0);
        seq.stop(Duration::ZERO);
        assert_eq!(seq.resume_beat(), 0.0);
        assert_eq!(seq.beat_number(), 0.0);
    }

    #[test]
    fn test_delayed_play_uses_audio_clock() {
        let mut seq = sequencer(120.0, &[(0.0, 1.0, 0)]);
        seq.play(Duration::from_millis(100));
        assert_eq!(seq.state(), TransportState::Stopped);

        step(&mut seq, 0.05);
        assert_eq!(seq.state(), TransportState::Stopped);
        assert!(seq.output().scheduled_tones().is_empty());

        step(&mut seq, 0.05);
        assert!(seq.is_playing());
        let tones = seq.output().scheduled_tones();
        assert_eq!(tones.len(), 1);
        assert!((tones[0].start_time - 0.1).abs() < EPSILON);
    }

    #[test]
    fn test_change_tempo_pivots_at_cursor() {
        let mut seq = sequencer(120.0, &[]);
        seq.play(Duration::ZERO);
        step(&mut seq, 0.5);

        let cursor = seq.beat_number();
        let pivot_time = seq.timeline().time_for(cursor);

        seq.change_tempo(240.0).unwrap();
        assert_eq!(seq.tempo(), 240.0);
        assert!((seq.timeline().time_for(cursor) - pivot_time).abs() < EPSILON);
        assert!((seq.timeline().time_for(cursor + 1.0) - (pivot_time + 0.25)).abs() < EPSILON);
    }

    #[test]
    fn test_pause_before_tempo_pivot_keeps_queued_notes() {
        let mut seq = sequencer(120.0, &[(1.0, 0.5, 0)]);
        seq.play(Duration::ZERO);
        step(&mut seq, 0.48);
        assert!((seq.beat_number() - 1.16).abs() < EPSILON);

        // Pivot at beat 1.16 sounds at 0.58s; beat 1.0 is still queued at 120 BPM
        seq.change_tempo(30.0).unwrap();
        seq.output_mut().advance(0.01);
        assert!((seq.playhead() - 0.98).abs() < 1e-6);

        seq.pause(Duration::ZERO);
        assert!((seq.resume_beat() - 0.98).abs() < 1e-6);
        assert!(seq.output().scheduled_tones().is_empty());

        seq.play(Duration::ZERO);
        let tones = seq.output().scheduled_tones();
        assert_eq!(tones.len(), 1);
        // 0.02 beats at 30 BPM after the resume instant
        assert!((tones[0].start_time - 0.53).abs() < 1e-6);
    }

    #[test]
    fn test_playhead_crosses_tempo_pivot() {
        let mut seq = sequencer(120.0, &[]);
        seq.play(Duration::ZERO);
        step(&mut seq, 0.48);

        seq.change_tempo(60.0).unwrap();
        // Past the pivot at 0.58s the new tempo applies: 1.16 + 0.12 beats
        seq.output_mut().advance(0.22);
        assert!((seq.playhead() - 1.28).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_tempo_change_keeps_timeline() {
        let mut seq = sequencer(120.0, &[]);
        let timeline = seq.timeline();

        assert!(seq.change_tempo(-10.0).is_err());
        assert!(seq.change_tempo(f64::NAN).is_err());
        assert_eq!(seq.timeline(), timeline);
        assert_eq!(seq.tempo(), 120.0);
    }

    #[test]
    fn test_loop_wrap_reschedules_loop_start() {
        // 8 beats at 120 BPM loop every 4 seconds
        let mut seq = sequencer(120.0, &[(0.0, 0.5, 0), (7.9, 0.1, 1)]);
        seq.play(Duration::ZERO);

        for _ in 0..164 {
            step(&mut seq, 0.025);
        }

        let starts: Vec<f64> = seq
            .output()
            .scheduled_tones()
            .iter()
            .map(|t| t.start_time)
            .collect();
        assert_eq!(starts.len(), 3);
        assert!((starts[0] - 0.0).abs() < EPSILON);
        assert!((starts[1] - 3.95).abs() < EPSILON);
        assert!((starts[2] - 4.0).abs() < EPSILON);
        assert!(seq.beat_number() < 1.0);
    }

    #[test]
    fn test_playhead_follows_clock() {
        let mut seq = sequencer(120.0, &[]);
        assert_eq!(seq.playhead(), 0.0);

        seq.play(Duration::ZERO);
        step(&mut seq, 1.0);
        assert!((seq.playhead() - 2.0).abs() < EPSILON);

        seq.pause(Duration::ZERO);
        assert!((seq.playhead() - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_closure_frequency_source() {
        let sequence = sequence_with(&[(0.0, 1.0, 3)]);
        let mut seq = Sequencer::new(
            |n: i32| 100.0 * n as f64,
            120.0,
            OfflineOutput::new(SAMPLE_RATE),
            sequence,
        )
        .unwrap();

        seq.play(Duration::ZERO);
        assert_eq!(seq.output().scheduled_tones()[0].frequency, 300.0);
    }
}

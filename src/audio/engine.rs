// Audio engine - Real-time CPAL output for scheduled tones
//
// # Format Support
//
// The device's preferred sample format is detected via `sample_format()`:
// - **F32**: native, no conversion
// - **I16**: common on Windows/WASAPI
// - **U16**: less common
//
// Mixing is done in f32 and converted when writing into the device buffer,
// through CPAL's `FromSample<f32>`, without allocating.
//
// # Threading
//
// Tones reach the callback through a lock-free ring buffer. The callback
// owns the mixer and advances the shared `AudioTiming`, which is the clock
// the scheduler reads through `current_time`.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::audio::output::{AudioOutput, ScheduledTone};
use crate::audio::timing::AudioTiming;
use crate::error::AudioError;
use crate::synth::tone::{ToneCommand, ToneMixer};

/// Capacity of the scheduler → callback command queue
///
/// One scheduling tick queues at most a handful of tones; 256 covers
/// several seconds of dense material even if the callback stalls.
const COMMAND_QUEUE_CAPACITY: usize = 256;

/// State moved into the audio callback
struct CallbackState {
    commands: HeapCons<ToneCommand>,
    mixer: ToneMixer,
    timing: AudioTiming,
    channels: usize,
    dropped: Arc<AtomicUsize>,
}

impl CallbackState {
    fn fill<T>(&mut self, data: &mut [T])
    where
        T: Sample + FromSample<f32>,
    {
        // ========== SACRED ZONE ==========
        // No allocations, No I/O, No blocking locks
        while let Some(command) = self.commands.try_pop() {
            if !self.mixer.handle(command) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }

        let start = self.timing.current_sample();
        let mut frames = 0;

        for (offset, frame) in data.chunks_mut(self.channels).enumerate() {
            // Soft clip overlapping tones into [-1, 1]
            let sample = self.mixer.next_sample(start + offset as u64).tanh();
            let value: T = Sample::from_sample::<f32>(sample);
            for channel_sample in frame.iter_mut() {
                *channel_sample = value;
            }
            frames += 1;
        }

        self.mixer.prune(start + frames as u64);
        self.timing.advance(frames);
        // ========== SACRED ZONE END ==========
    }
}

/// Default output device, driven by CPAL
pub struct CpalOutput {
    _device: Device,
    _stream: Stream,
    timing: AudioTiming,
    commands: HeapProd<ToneCommand>,
    dropped: Arc<AtomicUsize>,
}

impl CpalOutput {
    /// Open the default output device and start its stream
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoDevice)?;

        log::info!(
            "Audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let supported_config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let sample_format = supported_config.sample_format();
        let sample_rate = supported_config.sample_rate().0 as f64;
        let channels = supported_config.channels() as usize;
        log::debug!("Audio config: {:?}", supported_config);

        let config: StreamConfig = supported_config.into();

        let timing = AudioTiming::new(sample_rate);
        let (producer, consumer) = HeapRb::<ToneCommand>::new(COMMAND_QUEUE_CAPACITY).split();
        let dropped = Arc::new(AtomicUsize::new(0));

        let state = CallbackState {
            commands: consumer,
            mixer: ToneMixer::new(sample_rate),
            timing: timing.clone(),
            channels,
            dropped: Arc::clone(&dropped),
        };

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, state),
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, state),
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, state),
            other => {
                return Err(AudioError::StreamCreate(format!(
                    "Unsupported sample format: {:?}. Supported formats: F32, I16, U16",
                    other
                )));
            }
        }?;

        stream
            .play()
            .map_err(|e| AudioError::Playback(e.to_string()))?;

        Ok(Self {
            _device: device,
            _stream: stream,
            timing,
            commands: producer,
            dropped,
        })
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        mut state: CallbackState,
    ) -> Result<Stream, AudioError>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| state.fill(data),
                // Runs outside the audio callback, so logging is fine here
                |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))
    }

    pub fn sample_rate(&self) -> f64 {
        self.timing.sample_rate()
    }

    /// Shared clock advanced by the audio callback
    pub fn timing(&self) -> AudioTiming {
        self.timing.clone()
    }

    /// Tones dropped because the queue or the mixer was full
    pub fn dropped_tones(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    fn send(&mut self, command: ToneCommand) {
        if self.commands.try_push(command).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            log::warn!("Audio command queue full, dropping {:?}", command);
        }
    }
}

impl AudioOutput for CpalOutput {
    fn current_time(&self) -> f64 {
        self.timing.current_time()
    }

    fn schedule_tone(&mut self, tone: ScheduledTone) {
        self.send(ToneCommand::Schedule(tone));
    }

    fn cancel_from(&mut self, time: f64) {
        self.send(ToneCommand::CancelFrom(time));
    }
}

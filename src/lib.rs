// Lookahead sequencer - Library exports for tests and benchmarks

pub mod audio;
pub mod config;
pub mod error;
pub mod sequencer;
pub mod synth;
pub mod timer;
pub mod tuning;

// Re-export commonly used types for convenience
pub use audio::engine::CpalOutput;
pub use audio::offline::OfflineOutput;
pub use audio::output::{AudioOutput, ScheduledTone};
pub use audio::timing::AudioTiming;
pub use config::SequencerConfig;
pub use error::{AudioError, Result, SequencerError};
pub use sequencer::{
    Beat, BeatTimeline, Note, NoteId, NoteSequence, Sequencer, SharedSequence, Tempo,
    TransportState,
};
pub use synth::oscillator::WaveformType;
pub use timer::{TimerId, TimerQueue};
pub use tuning::{FrequencySource, Scale};

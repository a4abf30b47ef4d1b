// Error types for the sequencer core and its audio backends

/// Errors raised when invalid values are handed to the sequencer
///
/// Each of these is rejected before any state changes, so an invalid tempo
/// or note never reaches the scheduling loop.
#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("Invalid tempo: {0} BPM (must be finite and > 0)")]
    InvalidTempo(f64),

    #[error("Invalid note: start {start}, length {length} (start must be >= 0, length > 0)")]
    InvalidNote { start: f64, length: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("RON error: {0}")]
    Config(#[from] ron::error::SpannedError),

    #[error("RON serialization error: {0}")]
    Serialization(#[from] ron::Error),
}

/// Errors raised by a real-time audio output backend
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("No audio device available")]
    NoDevice,

    #[error("Device init error: {0}")]
    DeviceInit(String),

    #[error("Stream create error: {0}")]
    StreamCreate(String),

    #[error("Playback error: {0}")]
    Playback(String),
}

pub type Result<T> = std::result::Result<T, SequencerError>;

// Transport - Playback state
// Play/pause/stop states of the sequencer

use std::fmt;

/// Transport state (play/pause/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    /// Check if transport is stopped or paused
    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped | TransportState::Paused)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportState::Stopped => "stopped",
            TransportState::Playing => "playing",
            TransportState::Paused => "paused",
        };
        f.write_str(label)
    }
}

/// Deferred work queued on the sequencer's timer queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportTask {
    /// Periodic lookahead scheduling tick
    ScheduleNotes,
    Play,
    Pause,
    Stop,
}

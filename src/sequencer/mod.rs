// Sequencer module
// Beat timeline, note storage and the lookahead scheduler

pub mod note;
pub mod scheduler;
pub mod sequence;
pub mod timeline;
pub mod transport;

pub use note::{Note, NoteId};
pub use scheduler::Sequencer;
pub use sequence::{ListenerId, NoteSequence, SharedSequence};
pub use timeline::{Beat, BeatTimeline, Tempo};
pub use transport::{TransportState, TransportTask};

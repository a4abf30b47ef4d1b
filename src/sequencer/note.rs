// Note representation for the sequencer
// A note is a pitch index with a start beat and a length in beats

use crate::error::{Result, SequencerError};
use crate::sequencer::timeline::Beat;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for notes
pub type NoteId = u64;

/// Global note ID generator
static NEXT_NOTE_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a unique note ID
pub fn generate_note_id() -> NoteId {
    NEXT_NOTE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A musical note in the sequencer
///
/// Every note gets its own id when created. Removal and moves address a
/// note by that id, so two notes with identical fields stay distinct.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    id: NoteId,
    start: Beat,
    length: Beat,
    number: i32,
}

impl Note {
    /// Creates a new note
    ///
    /// `start` must be >= 0 and `length` > 0, both finite.
    pub fn new(start: Beat, length: Beat, number: i32) -> Result<Self> {
        validate(start, length)?;

        Ok(Self {
            id: generate_note_id(),
            start,
            length,
            number,
        })
    }

    pub fn id(&self) -> NoteId {
        self.id
    }

    /// Start position in beats
    pub fn start(&self) -> Beat {
        self.start
    }

    /// Length in beats
    pub fn length(&self) -> Beat {
        self.length
    }

    /// Pitch index, resolved to a frequency by the sequencer's scale
    pub fn number(&self) -> i32 {
        self.number
    }

    /// Beat at which this note stops sounding
    pub fn end(&self) -> Beat {
        self.start + self.length
    }

    /// Check if this note is sounding at a given beat
    pub fn contains_beat(&self, beat: Beat) -> bool {
        beat >= self.start && beat < self.end()
    }

    /// Move the note in place, keeping its id
    pub(crate) fn relocate(&mut self, start: Beat, number: i32) -> Result<()> {
        validate(start, self.length)?;
        self.start = start;
        self.number = number;
        Ok(())
    }
}

fn validate(start: Beat, length: Beat) -> Result<()> {
    let valid_start = start.is_finite() && start >= 0.0;
    let valid_length = length.is_finite() && length > 0.0;

    if valid_start && valid_length {
        Ok(())
    } else {
        Err(SequencerError::InvalidNote { start, length })
    }
}

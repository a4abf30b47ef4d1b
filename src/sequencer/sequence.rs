// Note sequence - Ordered, editable collection of notes
// Queried by the scheduler on every tick and edited concurrently by the UI

use crate::error::Result;
use crate::sequencer::note::{Note, NoteId};
use crate::sequencer::timeline::Beat;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Handle shared between the scheduler and whatever edits the sequence
pub type SharedSequence = Rc<RefCell<NoteSequence>>;

/// Identifier returned by `add_change_listener`
pub type ListenerId = u64;

type ChangeListener = Box<dyn FnMut()>;

/// Notes sorted by start beat
///
/// Among notes with the same start, the most recently inserted one comes
/// first. Listeners run synchronously, in registration order, after each
/// mutation; a listener must not borrow the sequence it is attached to.
#[derive(Default)]
pub struct NoteSequence {
    notes: Vec<Note>,
    listeners: Vec<(ListenerId, ChangeListener)>,
    next_listener_id: ListenerId,
}

impl NoteSequence {
    /// Create a new empty sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty sequence wrapped for sharing
    pub fn new_shared() -> SharedSequence {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Get all notes, in sequence order
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Get a note by ID
    pub fn get(&self, note_id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id() == note_id)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Index of the first note starting at or after `beat`, or `len()`
    ///
    /// Insertion points and both bounds of `get_notes` come from here.
    pub fn find_position(&self, beat: Beat) -> usize {
        self.notes.partition_point(|n| n.start() < beat)
    }

    /// Add a note to the sequence
    pub fn add_note(&mut self, note: Note) -> NoteId {
        let id = note.id();
        self.insert_sorted(note);
        self.notify();
        id
    }

    /// Remove a note by ID
    ///
    /// Listeners are notified even when the note is absent.
    pub fn remove_note(&mut self, note_id: NoteId) -> Option<Note> {
        let removed = self.take(note_id);
        self.notify();
        removed
    }

    /// Change a note's start and pitch, keeping the sequence sorted
    ///
    /// Returns `Ok(false)` if the note is not in the sequence. Listeners are
    /// notified once in either case, but not when `new_start` is invalid.
    pub fn move_note(&mut self, note_id: NoteId, new_start: Beat, new_number: i32) -> Result<bool> {
        let Some(index) = self.index_of(note_id) else {
            self.notify();
            return Ok(false);
        };

        let mut note = self.notes[index];
        note.relocate(new_start, new_number)?;

        self.notes.remove(index);
        self.insert_sorted(note);
        self.notify();
        Ok(true)
    }

    /// Notes with `start_beat <= start < end_beat`, in sequence order
    pub fn get_notes(&self, start_beat: Beat, end_beat: Beat) -> &[Note] {
        let start = self.find_position(start_beat);
        let end = self.find_position(end_beat);

        if end <= start {
            return &[];
        }
        &self.notes[start..end]
    }

    /// Remove every note
    pub fn clear(&mut self) {
        self.notes.clear();
        self.notify();
    }

    /// Register a callback invoked after every mutation
    pub fn add_change_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut() + 'static,
    {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregister a listener; returns false if it was not registered
    pub fn remove_change_listener(&mut self, listener_id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != listener_id);
        self.listeners.len() != before
    }

    fn insert_sorted(&mut self, note: Note) {
        let position = self.find_position(note.start());
        self.notes.insert(position, note);
    }

    fn index_of(&self, note_id: NoteId) -> Option<usize> {
        self.notes.iter().position(|n| n.id() == note_id)
    }

    fn take(&mut self, note_id: NoteId) -> Option<Note> {
        self.index_of(note_id).map(|index| self.notes.remove(index))
    }

    fn notify(&mut self) {
        for (_, listener) in self.listeners.iter_mut() {
            listener();
        }
    }
}

impl fmt::Debug for NoteSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoteSequence")
            .field("notes", &self.notes)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

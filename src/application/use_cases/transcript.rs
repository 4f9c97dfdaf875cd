//! Append-only session transcript.
//!
//! One transcript lives for the life of the process; the single active
//! request appends to it, nothing mutates past entries. Nothing is
//! persisted beyond the session.

use crate::domain::transcript::TranscriptEntry;
use uuid::Uuid;

pub struct SessionTranscript {
    session_id: Uuid,
    entries: Vec<TranscriptEntry>,
}

impl Default for SessionTranscript {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTranscript {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            entries: Vec::new(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn record_question(&mut self, question: &str) {
        self.entries.push(TranscriptEntry::user(question));
    }

    pub fn record_answer(&mut self, answer: &str, dax: Option<String>) {
        self.entries.push(TranscriptEntry::assistant(answer, dax));
    }

    /// Entries in chronological order. Only completed exchanges are ever
    /// recorded, so this doubles as the history window for prompts.
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

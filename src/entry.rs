use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a text entry. Assigned once per store, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Generation state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    Pending,
    /// Only held while a synthesis call is in flight.
    Generating,
    Generated,
    Failed,
}

impl EntryStatus {
    /// Whether a batch run should (re)attempt this entry.
    pub fn needs_generation(self) -> bool {
        matches!(self, EntryStatus::Pending | EntryStatus::Failed)
    }
}

/// Audio bytes together with the file name they are downloaded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAudio {
    pub output_name: String,
    pub bytes: Vec<u8>,
}

/// One unit of text, voice selection and generation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEntry {
    pub(crate) id: EntryId,
    pub(crate) text: String,
    pub(crate) voice_id: String,
    pub(crate) status: EntryStatus,
    pub(crate) audio: Option<GeneratedAudio>,
    pub(crate) last_error: Option<String>,
}

impl TextEntry {
    pub(crate) fn new(id: EntryId, voice_id: String) -> Self {
        Self {
            id,
            text: String::new(),
            voice_id,
            status: EntryStatus::Pending,
            audio: None,
            last_error: None,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn audio(&self) -> Option<&GeneratedAudio> {
        self.audio.as_ref()
    }

    pub fn output_name(&self) -> Option<&str> {
        self.audio.as_ref().map(|a| a.output_name.as_str())
    }

    /// Message of the last synthesis failure, while the entry is `Failed`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Drop any generated audio and go back to `Pending`.
    pub(crate) fn invalidate(&mut self) {
        if self.status != EntryStatus::Pending {
            log::debug!("Entry {} reset to pending", self.id);
        }
        self.status = EntryStatus::Pending;
        self.audio = None;
        self.last_error = None;
    }

    pub(crate) fn mark_generated(&mut self, audio: GeneratedAudio) {
        self.status = EntryStatus::Generated;
        self.audio = Some(audio);
        self.last_error = None;
    }

    pub(crate) fn mark_failed(&mut self, message: String) {
        self.status = EntryStatus::Failed;
        self.audio = None;
        self.last_error = Some(message);
    }
}

//! # tts-batch
//!
//! A Rust library for preparing batches of text-to-speech entries, driving an
//! external synthesis service one entry at a time, and exporting the
//! generated audio as a ZIP archive.
//!
//! ## Features
//!
//! - **Entry Store**: ordered list of text entries with stale-audio invalidation
//! - **Sequential batches**: every pending or failed entry attempted once, in order
//! - **Bulk export**: all generated audio packaged into one archive
//! - **Voice catalog**: cached voice list with locale grouping and search
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! tts-batch = "2026.2"
//! ```
//!
//! ```ignore
//! use tts_batch::{EntryStore, SessionConfig, VoiceCatalog};
//!
//! let catalog = VoiceCatalog::load(&mut my_voice_source)?;
//! let mut store = EntryStore::new(catalog, SessionConfig::default(), my_engine);
//!
//! let id = store.create_entry();
//! store.set_text(id, "Hello, world!")?;
//! store.generate(id)?;
//!
//! std::fs::write(store.archive_file_name(), store.build_archive()?)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod entry;
pub mod error;
pub mod export;
pub mod output;
pub mod settings;
pub mod store;
pub mod voices;

pub use entry::{EntryId, EntryStatus, GeneratedAudio, TextEntry};
pub use error::BatchError;
pub use export::{archive_file_name, build_archive, ExportSummary, ExportedFile};
pub use output::OutputDir;
pub use settings::{Adjustment, SessionConfig, SessionConfigBuilder};
pub use store::{BatchItem, EntryStore, GenerationOutcome};
pub use voices::{LocaleGroup, VoiceCatalog, VoiceRecord, VoiceSource};

/// Everything the synthesis service needs to voice one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    /// Text to speak
    pub text: String,
    /// Catalog id of the voice (e.g. `"en-US-AriaNeural"`)
    pub voice_id: String,
    /// Speech rate offset, rendered as `+N%` / `-N%`
    pub rate: Adjustment,
    /// Volume offset, rendered as `+N%` / `-N%`
    pub volume: Adjustment,
}

/// Common interface for text-to-speech services.
///
/// An engine turns one request into encoded audio bytes (MP3 for the default
/// file extension). Calls are made one at a time; implementations do not
/// need to be safe for concurrent use. Any
/// `FnMut(&SynthesisRequest) -> Result<Vec<u8>, Box<dyn Error>>` closure is
/// an engine.
pub trait SynthesisEngine {
    /// Synthesize speech for the request and return the encoded audio.
    fn synthesize(
        &mut self,
        request: &SynthesisRequest,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error>>;
}

impl<F> SynthesisEngine for F
where
    F: FnMut(&SynthesisRequest) -> Result<Vec<u8>, Box<dyn std::error::Error>>,
{
    fn synthesize(
        &mut self,
        request: &SynthesisRequest,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        self(request)
    }
}

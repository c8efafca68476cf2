use crate::entry::EntryId;

#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    #[error("Voice '{0}' is not in the voice catalog.")]
    InvalidVoice(String),
    #[error("No entry with id {0}.")]
    EntryNotFound(EntryId),
    #[error("Synthesis failed for entry {id}: {message}")]
    SynthesisFailure { id: EntryId, message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("Invalid adjustment '{0}'. Expected a signed percentage such as +0%, +10% or -10%.")]
    InvalidAdjustment(String),
    #[error("The voice catalog is empty.")]
    EmptyCatalog,
    #[error("Failed to load voice catalog: {0}")]
    Catalog(String),
    #[error("Invalid session config: {0}")]
    Config(String),
}

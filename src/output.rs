use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::entry::TextEntry;
use crate::error::BatchError;

/// Longest run of text kept in an on-disk file name.
const MAX_STEM_CHARS: usize = 30;

/// Eight lowercase hex characters from a fresh v4 UUID.
pub(crate) fn random_suffix() -> String {
    let mut hex = uuid::Uuid::new_v4().simple().to_string();
    hex.truncate(8);
    hex
}

/// Reduce entry text to a file-name stem: alphanumerics are kept, every
/// other run of characters becomes one `_`. Falls back to `audio`.
pub fn sanitize_stem(text: &str) -> String {
    let mut stem = String::new();
    for c in text.chars() {
        if stem.chars().count() >= MAX_STEM_CHARS {
            break;
        }
        if c.is_alphanumeric() {
            stem.extend(c.to_lowercase());
        } else if !stem.is_empty() && !stem.ends_with('_') {
            stem.push('_');
        }
    }
    let stem = stem.trim_end_matches('_');
    if stem.is_empty() {
        "audio".to_string()
    } else {
        stem.to_string()
    }
}

/// Optional on-disk copy of generated audio.
///
/// Files are written to a temporary name first and renamed into place, so a
/// failed write never leaves a partial file under the final name.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    /// Use `root` as the output directory, creating it if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, BatchError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Write a generated entry's audio as
    /// `<sanitized text>_<id>_<random>.<extension>` and return the path.
    /// Entries without audio are skipped and yield `None`.
    pub fn save(&self, entry: &TextEntry, extension: &str) -> Result<Option<PathBuf>, BatchError> {
        let Some(audio) = entry.audio() else {
            return Ok(None);
        };
        let file_name = format!(
            "{}_{}_{}.{}",
            sanitize_stem(entry.text()),
            entry.id(),
            random_suffix(),
            extension
        );
        let path = self.write_file(&file_name, &audio.bytes)?;
        log::debug!("Saved entry {} to {}", entry.id(), path.display());
        Ok(Some(path))
    }

    /// Write `bytes` to `file_name` inside the directory via a temporary file.
    pub fn write_file(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, BatchError> {
        let target = self.root.join(file_name);
        let temp = self.root.join(format!(".{}.{}.tmp", file_name, random_suffix()));

        let written = write_and_rename(&temp, &target, bytes);
        if written.is_err() {
            remove_best_effort(&temp);
        }
        written?;
        Ok(target)
    }
}

fn write_and_rename(temp: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(temp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(temp, target)
}

/// Remove a temporary file. Failures are logged and never propagated.
pub(crate) fn remove_best_effort(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove temporary file {}: {}", path.display(), e),
    }
}

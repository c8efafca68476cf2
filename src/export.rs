use std::collections::HashMap;
use std::io::{Cursor, Write};

use chrono::NaiveDateTime;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::entry::{EntryStatus, TextEntry};
use crate::error::BatchError;
use crate::store::EntryStore;
use crate::voices::VoiceCatalog;
use crate::SynthesisEngine;

/// Characters of entry text shown in an export summary.
const PREVIEW_CHARS: usize = 100;

/// Package the audio of every generated entry into a deflate-compressed ZIP.
///
/// Entries are taken in the given order; entries without audio are skipped.
/// Should two entries share an output name, the later one's bytes win.
/// With no generated entries the result is a valid, empty archive.
pub fn build_archive<'a>(
    entries: impl IntoIterator<Item = &'a TextEntry>,
) -> Result<Vec<u8>, BatchError> {
    let mut files: Vec<(&str, &[u8])> = Vec::new();
    let mut index_by_name: HashMap<&str, usize> = HashMap::new();

    for entry in entries {
        if entry.status() != EntryStatus::Generated {
            continue;
        }
        let Some(audio) = entry.audio() else {
            continue;
        };
        let name = audio.output_name.as_str();
        match index_by_name.get(name) {
            Some(&i) => {
                log::warn!("Duplicate archive entry '{}', keeping the later one", name);
                files[i].1 = audio.bytes.as_slice();
            }
            None => {
                index_by_name.insert(name, files.len());
                files.push((name, audio.bytes.as_slice()));
            }
        }
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in &files {
        zip.start_file(*name, options)?;
        zip.write_all(bytes)?;
    }
    let archive = zip.finish()?.into_inner();

    log::info!(
        "Built archive with {} files ({} bytes)",
        files.len(),
        archive.len()
    );
    Ok(archive)
}

/// Download name for an archive, e.g. `tts_audio_20240131_235959.zip`.
pub fn archive_file_name(prefix: &str, at: &NaiveDateTime) -> String {
    format!("{}_{}.zip", prefix, at.format("%Y%m%d_%H%M%S"))
}

/// One line of an export summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    /// 1-based number within the export.
    pub number: usize,
    pub output_name: String,
    pub voice_id: String,
    pub locale: String,
    pub gender: String,
    pub text_preview: String,
}

/// Human-readable description of what an archive contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub files: Vec<ExportedFile>,
}

impl ExportSummary {
    pub fn new<'a>(catalog: &VoiceCatalog, entries: impl IntoIterator<Item = &'a TextEntry>) -> Self {
        let files = entries
            .into_iter()
            .filter_map(|entry| entry.output_name().map(|name| (entry, name)))
            .enumerate()
            .map(|(i, (entry, name))| {
                let voice = catalog.get(entry.voice_id());
                ExportedFile {
                    number: i + 1,
                    output_name: name.to_string(),
                    voice_id: entry.voice_id().to_string(),
                    locale: voice.map_or("Unknown", |v| v.locale.as_str()).to_string(),
                    gender: voice.map_or("Unknown", |v| v.gender.as_str()).to_string(),
                    text_preview: preview(entry.text()),
                }
            })
            .collect();
        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

impl<E: SynthesisEngine> EntryStore<E> {
    /// ZIP of every generated entry, in store order.
    pub fn build_archive(&self) -> Result<Vec<u8>, BatchError> {
        build_archive(self.generated())
    }

    /// Whether a bulk download should be offered at all.
    pub fn has_downloads(&self) -> bool {
        self.generated().next().is_some()
    }

    /// Archive download name stamped with the local time.
    pub fn archive_file_name(&self) -> String {
        archive_file_name(
            &self.settings().archive_prefix,
            &chrono::Local::now().naive_local(),
        )
    }

    pub fn export_summary(&self) -> ExportSummary {
        ExportSummary::new(self.catalog(), self.generated())
    }
}

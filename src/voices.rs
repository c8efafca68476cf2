use serde::{Deserialize, Serialize};

use crate::error::BatchError;

/// A synthetic speaker offered by the synthesis service.
///
/// Deserialises both from this crate's own field names and from the
/// service's voice-list JSON (`ShortName`, `Locale`, `Gender`, `FriendlyName`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceRecord {
    #[serde(alias = "ShortName")]
    pub id: String,
    #[serde(alias = "Locale")]
    pub locale: String,
    #[serde(alias = "Gender")]
    pub gender: String,
    #[serde(alias = "FriendlyName", default)]
    pub display_name: String,
}

/// Where the voice catalog comes from.
pub trait VoiceSource {
    /// Fetch the full, ordered list of voices.
    fn fetch_voices(&mut self) -> Result<Vec<VoiceRecord>, Box<dyn std::error::Error>>;
}

impl<F> VoiceSource for F
where
    F: FnMut() -> Result<Vec<VoiceRecord>, Box<dyn std::error::Error>>,
{
    fn fetch_voices(&mut self) -> Result<Vec<VoiceRecord>, Box<dyn std::error::Error>> {
        self()
    }
}

/// Voices sharing one locale, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleGroup<'a> {
    pub locale: &'a str,
    pub voices: Vec<&'a VoiceRecord>,
}

/// The session's cached, read-only list of voices.
#[derive(Debug, Clone)]
pub struct VoiceCatalog {
    voices: Vec<VoiceRecord>,
}

impl VoiceCatalog {
    /// Build a catalog from an already-fetched list. The list must not be empty.
    pub fn new(voices: Vec<VoiceRecord>) -> Result<Self, BatchError> {
        if voices.is_empty() {
            return Err(BatchError::EmptyCatalog);
        }
        Ok(Self { voices })
    }

    /// Query the source once and keep the result for the session.
    pub fn load(source: &mut dyn VoiceSource) -> Result<Self, BatchError> {
        let voices = source
            .fetch_voices()
            .map_err(|e| BatchError::Catalog(e.to_string()))?;
        log::info!("Loaded {} voices", voices.len());
        Self::new(voices)
    }

    /// Parse a JSON array of voice records.
    pub fn from_json(json: &str) -> Result<Self, BatchError> {
        let voices: Vec<VoiceRecord> =
            serde_json::from_str(json).map_err(|e| BatchError::Catalog(e.to_string()))?;
        Self::new(voices)
    }

    pub fn voices(&self) -> &[VoiceRecord] {
        &self.voices
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&VoiceRecord> {
        self.voices.iter().find(|v| v.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// The preferred voice if the catalog knows it, otherwise the first voice.
    pub fn resolve_default(&self, preferred: &str) -> &VoiceRecord {
        self.get(preferred).unwrap_or(&self.voices[0])
    }

    /// Group voices by locale. Groups appear in the order their locale is
    /// first seen in the catalog.
    pub fn group_by_locale(&self) -> Vec<LocaleGroup<'_>> {
        let mut groups: Vec<LocaleGroup<'_>> = Vec::new();
        for voice in &self.voices {
            match groups.iter().position(|g| g.locale == voice.locale) {
                Some(i) => groups[i].voices.push(voice),
                None => groups.push(LocaleGroup {
                    locale: &voice.locale,
                    voices: vec![voice],
                }),
            }
        }
        groups
    }

    /// Selection label such as `en-US-AriaNeural (en-US, Female)`.
    pub fn label(&self, id: &str) -> Option<String> {
        self.get(id)
            .map(|v| format!("{} ({}, {})", v.id, v.locale, v.gender))
    }

    /// Case-insensitive substring match on id, locale, gender and display name.
    pub fn search(&self, query: &str) -> Vec<&VoiceRecord> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.voices.iter().collect();
        }
        self.voices
            .iter()
            .filter(|v| {
                [&v.id, &v.locale, &v.gender, &v.display_name]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn voice(id: &str, locale: &str, gender: &str) -> VoiceRecord {
    VoiceRecord {
        id: id.to_string(),
        locale: locale.to_string(),
        gender: gender.to_string(),
        display_name: format!("Microsoft {id}"),
    }
}

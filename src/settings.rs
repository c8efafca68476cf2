use std::fmt;
use std::path::Path;
use std::str::FromStr;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::BatchError;

/// Voice used for new entries when the caller does not pick one.
pub const DEFAULT_VOICE: &str = "en-US-SteffanNeural";

/// A signed percentage offset applied to speech rate or volume.
///
/// The textual form is what the synthesis service expects: an explicit sign,
/// one or more digits and a trailing `%` (e.g. `+0%`, `+10%`, `-25%`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Adjustment(i32);

impl Adjustment {
    pub const NEUTRAL: Adjustment = Adjustment(0);

    pub fn percent(value: i32) -> Self {
        Self(value)
    }

    pub fn value(self) -> i32 {
        self.0
    }
}

impl FromStr for Adjustment {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BatchError::InvalidAdjustment(s.to_string());
        let trimmed = s.trim();

        let digits = trimmed
            .strip_suffix('%')
            .and_then(|rest| rest.strip_prefix(['+', '-']))
            .ok_or_else(invalid)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let magnitude: i32 = digits.parse().map_err(|_| invalid())?;
        if trimmed.starts_with('-') {
            Ok(Self(-magnitude))
        } else {
            Ok(Self(magnitude))
        }
    }
}

impl TryFrom<String> for Adjustment {
    type Error = BatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Adjustment> for String {
    fn from(value: Adjustment) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}%", self.0)
    }
}

/// Settings shared by every entry of one session.
///
/// ```rust
/// use tts_batch::{Adjustment, SessionConfigBuilder};
///
/// let config = SessionConfigBuilder::default()
///     .default_voice("en-GB-SoniaNeural")
///     .rate(Adjustment::percent(10))
///     .build()?;
/// assert_eq!(config.rate.to_string(), "+10%");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(default, setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct SessionConfig {
    /// Voice assigned to new entries; falls back to the catalog's first voice.
    pub default_voice: String,
    /// Speech rate offset sent with every synthesis call.
    pub rate: Adjustment,
    /// Volume offset sent with every synthesis call.
    pub volume: Adjustment,
    /// Leading part of the bulk download file name.
    pub archive_prefix: String,
    /// Extension of generated audio files, without the dot.
    pub audio_extension: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_voice: DEFAULT_VOICE.to_string(),
            rate: Adjustment::NEUTRAL,
            volume: Adjustment::NEUTRAL,
            archive_prefix: "tts_audio".to_string(),
            audio_extension: "mp3".to_string(),
        }
    }
}

impl SessionConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(prefix) = &self.archive_prefix {
            check_name_part("archive_prefix", prefix)?;
        }
        if let Some(ext) = &self.audio_extension {
            check_name_part("audio_extension", ext)?;
        }
        Ok(())
    }
}

impl SessionConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, BatchError> {
        let raw = std::fs::read_to_string(path)?;
        let config: SessionConfig = serde_json::from_str(&raw)
            .map_err(|e| BatchError::Config(format!("{}: {e}", path.display())))?;
        check_name_part("archive_prefix", &config.archive_prefix).map_err(BatchError::Config)?;
        check_name_part("audio_extension", &config.audio_extension)
            .map_err(BatchError::Config)?;
        Ok(config)
    }
}

fn check_name_part(field: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    if value.contains(['/', '\\', '.']) {
        return Err(format!("{field} must not contain path separators or dots"));
    }
    Ok(())
}

use std::path::PathBuf;

use crate::entry::{EntryId, EntryStatus, GeneratedAudio, TextEntry};
use crate::error::BatchError;
use crate::output::{random_suffix, OutputDir};
use crate::settings::{Adjustment, SessionConfig};
use crate::voices::VoiceCatalog;
use crate::{SynthesisEngine, SynthesisRequest};

/// Result of a successful `generate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub id: EntryId,
    pub output_name: String,
    /// Size of the generated audio in bytes.
    pub audio_len: usize,
    /// True when the entry was already generated and the service was not called.
    pub cached: bool,
}

impl GenerationOutcome {
    fn new(id: EntryId, audio: &GeneratedAudio, cached: bool) -> Self {
        Self {
            id,
            output_name: audio.output_name.clone(),
            audio_len: audio.bytes.len(),
            cached,
        }
    }
}

/// Per-entry report from a batch run.
#[derive(Debug)]
pub struct BatchItem {
    pub id: EntryId,
    /// 1-based position of this entry within the batch.
    pub position: usize,
    /// Number of entries the batch attempts.
    pub total: usize,
    pub result: Result<GenerationOutcome, BatchError>,
}

/// Ordered set of text entries for one session.
///
/// The store owns the entries, their audio, the cached voice catalog and the
/// synthesis engine. Every mutating operation takes `&mut self`, so a session
/// has a single sequential path and at most one synthesis call in flight.
pub struct EntryStore<E> {
    catalog: VoiceCatalog,
    config: SessionConfig,
    engine: E,
    entries: Vec<TextEntry>,
    next_id: u64,
}

impl<E: SynthesisEngine> EntryStore<E> {
    pub fn new(catalog: VoiceCatalog, config: SessionConfig, engine: E) -> Self {
        Self {
            catalog,
            config,
            engine,
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub fn catalog(&self) -> &VoiceCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &SessionConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Change the session-wide speech rate. Existing audio is kept.
    pub fn set_rate(&mut self, rate: Adjustment) {
        self.config.rate = rate;
    }

    /// Change the session-wide volume. Existing audio is kept.
    pub fn set_volume(&mut self, volume: Adjustment) {
        self.config.volume = volume;
    }

    pub fn entries(&self) -> &[TextEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: EntryId) -> Option<&TextEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// 1-based display number of the entry.
    pub fn position(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id).map(|i| i + 1)
    }

    /// Entries holding audio, in store order.
    pub fn generated(&self) -> impl Iterator<Item = &TextEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::Generated)
    }

    /// Number of entries a batch run would attempt.
    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status.needs_generation())
            .count()
    }

    /// Append an empty entry using the default voice.
    pub fn create_entry(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;

        let voice = self.catalog.resolve_default(&self.config.default_voice);
        if voice.id != self.config.default_voice {
            log::debug!(
                "Default voice '{}' not in catalog, using '{}'",
                self.config.default_voice,
                voice.id
            );
        }
        self.entries.push(TextEntry::new(id, voice.id.clone()));
        id
    }

    /// Make sure the session shows at least one entry. Returns the first id.
    pub fn ensure_entry(&mut self) -> EntryId {
        match self.entries.first() {
            Some(entry) => entry.id,
            None => self.create_entry(),
        }
    }

    /// Delete the entry if present. Returns whether anything was removed.
    pub fn remove_entry(&mut self, id: EntryId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    /// Replace the entry's text. Any generated audio becomes stale and is dropped.
    pub fn set_text(&mut self, id: EntryId, text: impl Into<String>) -> Result<(), BatchError> {
        let entry = self.entry_mut(id)?;
        entry.text = text.into();
        entry.invalidate();
        Ok(())
    }

    /// Change the entry's voice. Any generated audio becomes stale and is dropped.
    pub fn set_voice(&mut self, id: EntryId, voice_id: &str) -> Result<(), BatchError> {
        self.check_voice(voice_id)?;
        let entry = self.entry_mut(id)?;
        entry.voice_id = voice_id.to_string();
        entry.invalidate();
        Ok(())
    }

    /// Set every entry's voice. Nothing changes if the voice is unknown.
    pub fn apply_voice_to_all(&mut self, voice_id: &str) -> Result<(), BatchError> {
        self.check_voice(voice_id)?;
        for entry in &mut self.entries {
            entry.voice_id = voice_id.to_string();
            entry.invalidate();
        }
        log::info!("Applied voice '{}' to {} entries", voice_id, self.entries.len());
        Ok(())
    }

    /// Synthesize audio for one entry.
    ///
    /// A `Generated` entry is returned as-is without calling the engine.
    /// `Pending` and `Failed` entries are sent to the engine with the session
    /// rate and volume; on failure the entry becomes `Failed` and stays
    /// eligible for another attempt.
    pub fn generate(&mut self, id: EntryId) -> Result<GenerationOutcome, BatchError> {
        let Self {
            entries,
            engine,
            config,
            ..
        } = self;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(BatchError::EntryNotFound(id))?;

        if entry.status == EntryStatus::Generated {
            if let Some(audio) = &entry.audio {
                return Ok(GenerationOutcome::new(id, audio, true));
            }
        }

        synthesize_entry(entry, engine, config)
    }

    /// Attempt every `Pending` or `Failed` entry once, strictly in store order.
    pub fn generate_all_pending(&mut self) -> Vec<BatchItem> {
        self.generate_all_pending_with(|_| {})
    }

    /// Like [`generate_all_pending`](Self::generate_all_pending), reporting
    /// each entry to `observer` as soon as it is done.
    pub fn generate_all_pending_with(
        &mut self,
        mut observer: impl FnMut(&BatchItem),
    ) -> Vec<BatchItem> {
        let ids: Vec<EntryId> = self
            .entries
            .iter()
            .filter(|e| e.status.needs_generation())
            .map(|e| e.id)
            .collect();
        let total = ids.len();
        if total == 0 {
            log::info!("No pending entries to generate");
            return Vec::new();
        }

        let mut items = Vec::with_capacity(total);
        for (index, id) in ids.into_iter().enumerate() {
            let item = BatchItem {
                id,
                position: index + 1,
                total,
                result: self.generate(id),
            };
            observer(&item);
            items.push(item);
        }

        let failed = items.iter().filter(|i| i.result.is_err()).count();
        log::info!(
            "Batch finished: {} generated, {} failed",
            total - failed,
            failed
        );
        items
    }

    /// Copy a generated entry's audio into `dir`. The in-memory audio stays
    /// available for export whether or not the write succeeds.
    pub fn save_entry(&self, id: EntryId, dir: &OutputDir) -> Result<Option<PathBuf>, BatchError> {
        let entry = self.get(id).ok_or(BatchError::EntryNotFound(id))?;
        dir.save(entry, &self.config.audio_extension)
    }

    fn check_voice(&self, voice_id: &str) -> Result<(), BatchError> {
        if self.catalog.contains(voice_id) {
            Ok(())
        } else {
            Err(BatchError::InvalidVoice(voice_id.to_string()))
        }
    }

    fn entry_mut(&mut self, id: EntryId) -> Result<&mut TextEntry, BatchError> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(BatchError::EntryNotFound(id))
    }
}

/// Holds an entry in `Generating` for the duration of one engine call.
/// If the call unwinds before settling, the entry is left `Failed`.
struct InFlight<'a> {
    entry: &'a mut TextEntry,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn start(entry: &'a mut TextEntry) -> Self {
        entry.status = EntryStatus::Generating;
        entry.audio = None;
        entry.last_error = None;
        Self {
            entry,
            settled: false,
        }
    }

    fn succeed(&mut self, audio: GeneratedAudio) {
        self.entry.mark_generated(audio);
        self.settled = true;
    }

    fn fail(&mut self, message: String) {
        self.entry.mark_failed(message);
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            log::warn!("Synthesis for entry {} was interrupted", self.entry.id);
            self.entry
                .mark_failed("synthesis was interrupted".to_string());
        }
    }
}

fn synthesize_entry<E: SynthesisEngine>(
    entry: &mut TextEntry,
    engine: &mut E,
    config: &SessionConfig,
) -> Result<GenerationOutcome, BatchError> {
    let id = entry.id;
    let request = SynthesisRequest {
        text: entry.text.clone(),
        voice_id: entry.voice_id.clone(),
        rate: config.rate,
        volume: config.volume,
    };
    log::debug!("Generating entry {} with voice '{}'", id, request.voice_id);

    let mut flight = InFlight::start(entry);
    let message = match engine.synthesize(&request) {
        Ok(bytes) if !bytes.is_empty() => {
            let audio = GeneratedAudio {
                output_name: format!(
                    "audio_{}_{}.{}",
                    id,
                    random_suffix(),
                    config.audio_extension
                ),
                bytes,
            };
            let outcome = GenerationOutcome::new(id, &audio, false);
            flight.succeed(audio);
            log::debug!("Entry {} generated as {}", id, outcome.output_name);
            return Ok(outcome);
        }
        Ok(_) => "no audio was received".to_string(),
        Err(e) => e.to_string(),
    };

    log::warn!("Error generating audio for entry {}: {}", id, message);
    flight.fail(message.clone());
    Err(BatchError::SynthesisFailure { id, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voices::voice;

    /// Returns the text's bytes as "audio" and fails for any text containing "fail".
    #[derive(Default)]
    struct EchoEngine {
        requests: Vec<SynthesisRequest>,
    }

    impl SynthesisEngine for EchoEngine {
        fn synthesize(
            &mut self,
            request: &SynthesisRequest,
        ) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
            self.requests.push(request.clone());
            if request.text.contains("fail") {
                return Err("service rejected the request".into());
            }
            Ok(request.text.as_bytes().to_vec())
        }
    }

    fn store() -> EntryStore<EchoEngine> {
        let catalog = VoiceCatalog::new(vec![
            voice("en-US-AriaNeural", "en-US", "Female"),
            voice("en-US-SteffanNeural", "en-US", "Male"),
            voice("fr-FR-DeniseNeural", "fr-FR", "Female"),
        ])
        .expect("catalog");
        EntryStore::new(catalog, SessionConfig::default(), EchoEngine::default())
    }

    fn entry_with_text(store: &mut EntryStore<EchoEngine>, text: &str) -> EntryId {
        let id = store.create_entry();
        store.set_text(id, text).expect("set text");
        id
    }

    fn assert_joint_presence(store: &EntryStore<EchoEngine>) {
        for entry in store.entries() {
            assert_eq!(entry.audio().is_some(), entry.output_name().is_some());
            assert_eq!(
                entry.audio().is_some(),
                entry.status() == EntryStatus::Generated
            );
        }
    }

    #[test]
    fn create_uses_configured_default_voice() {
        let mut store = store();
        let id = store.create_entry();
        let entry = store.get(id).expect("entry exists");
        assert_eq!(entry.voice_id(), "en-US-SteffanNeural");
        assert_eq!(entry.status(), EntryStatus::Pending);
        assert_eq!(entry.text(), "");
    }

    #[test]
    fn create_falls_back_to_first_voice() {
        let catalog = VoiceCatalog::new(vec![voice("de-DE-KatjaNeural", "de-DE", "Female")])
            .expect("catalog");
        let mut store = EntryStore::new(catalog, SessionConfig::default(), EchoEngine::default());
        let id = store.create_entry();
        assert_eq!(store.get(id).map(|e| e.voice_id()), Some("de-DE-KatjaNeural"));
    }

    #[test]
    fn ids_are_never_reused() {
        let mut store = store();
        let a = store.create_entry();
        let b = store.create_entry();
        assert!(store.remove_entry(b));
        let c = store.create_entry();
        assert_ne!(b, c);
        assert!(c > b);
        assert_eq!(store.position(a), Some(1));
        assert_eq!(store.position(c), Some(2));
    }

    #[test]
    fn removing_unknown_entry_is_a_no_op() {
        let mut store = store();
        store.create_entry();
        assert!(!store.remove_entry(EntryId(42)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn ensure_entry_only_creates_when_empty() {
        let mut store = store();
        let first = store.ensure_entry();
        assert_eq!(store.ensure_entry(), first);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn set_text_always_resets_to_pending() {
        let mut store = store();
        let id = entry_with_text(&mut store, "hello");
        store.generate(id).expect("generate");

        store.set_text(id, "hello").expect("same text");
        let entry = store.get(id).expect("entry");
        assert_eq!(entry.status(), EntryStatus::Pending);
        assert!(entry.audio().is_none());
        assert_joint_presence(&store);
    }

    #[test]
    fn set_text_clears_failure() {
        let mut store = store();
        let id = entry_with_text(&mut store, "please fail");
        assert!(store.generate(id).is_err());
        assert_eq!(store.get(id).map(|e| e.status()), Some(EntryStatus::Failed));

        store.set_text(id, "fine now").expect("set text");
        let entry = store.get(id).expect("entry");
        assert_eq!(entry.status(), EntryStatus::Pending);
        assert_eq!(entry.last_error(), None);
    }

    #[test]
    fn set_voice_rejects_unknown_voice_without_changes() {
        let mut store = store();
        let id = entry_with_text(&mut store, "hello");
        store.generate(id).expect("generate");

        let err = store.set_voice(id, "xx-XX-Nobody").unwrap_err();
        assert!(matches!(err, BatchError::InvalidVoice(v) if v == "xx-XX-Nobody"));
        let entry = store.get(id).expect("entry");
        assert_eq!(entry.status(), EntryStatus::Generated);
        assert_eq!(entry.voice_id(), "en-US-SteffanNeural");
    }

    #[test]
    fn set_voice_invalidates_audio() {
        let mut store = store();
        let id = entry_with_text(&mut store, "bonjour");
        store.generate(id).expect("generate");
        store.set_voice(id, "fr-FR-DeniseNeural").expect("valid voice");

        let entry = store.get(id).expect("entry");
        assert_eq!(entry.voice_id(), "fr-FR-DeniseNeural");
        assert_eq!(entry.status(), EntryStatus::Pending);
        assert!(entry.output_name().is_none());
    }

    #[test]
    fn edits_on_unknown_entry_are_reported() {
        let mut store = store();
        assert!(matches!(
            store.set_text(EntryId(9), "x"),
            Err(BatchError::EntryNotFound(EntryId(9)))
        ));
        assert!(matches!(
            store.generate(EntryId(9)),
            Err(BatchError::EntryNotFound(EntryId(9)))
        ));
    }

    #[test]
    fn generate_is_idempotent_once_generated() {
        let mut store = store();
        let id = entry_with_text(&mut store, "hello");

        let first = store.generate(id).expect("first");
        let second = store.generate(id).expect("second");
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.output_name, second.output_name);
        assert_eq!(store.engine().requests.len(), 1);
    }

    #[test]
    fn generate_sends_entry_and_session_settings() {
        let mut store = store();
        store.set_rate(Adjustment::percent(10));
        store.set_volume(Adjustment::percent(-5));
        let id = entry_with_text(&mut store, "hello");
        store.set_voice(id, "en-US-AriaNeural").expect("voice");
        store.generate(id).expect("generate");

        let request = &store.engine().requests[0];
        assert_eq!(request.text, "hello");
        assert_eq!(request.voice_id, "en-US-AriaNeural");
        assert_eq!(request.rate.to_string(), "+10%");
        assert_eq!(request.volume.to_string(), "-5%");
    }

    #[test]
    fn output_names_embed_id_and_are_unique() {
        let mut store = store();
        let a = entry_with_text(&mut store, "same");
        let b = entry_with_text(&mut store, "same");
        let name_a = store.generate(a).expect("a").output_name;
        let name_b = store.generate(b).expect("b").output_name;

        assert!(name_a.starts_with(&format!("audio_{a}_")));
        assert!(name_a.ends_with(".mp3"));
        assert_ne!(name_a, name_b);
    }

    #[test]
    fn failed_entry_is_retryable() {
        let mut store = store();
        let id = entry_with_text(&mut store, "fail once");

        let err = store.generate(id).unwrap_err();
        assert!(matches!(err, BatchError::SynthesisFailure { id: failed, .. } if failed == id));
        let entry = store.get(id).expect("entry");
        assert_eq!(entry.status(), EntryStatus::Failed);
        assert_eq!(entry.last_error(), Some("service rejected the request"));

        // a retry calls the engine again
        assert!(store.generate(id).is_err());
        assert_eq!(store.engine().requests.len(), 2);
        assert_joint_presence(&store);
    }

    #[test]
    fn empty_audio_counts_as_failure() {
        let mut store = store();
        let id = store.create_entry();
        let err = store.generate(id).unwrap_err();
        assert!(matches!(err, BatchError::SynthesisFailure { .. }));
        assert_eq!(store.get(id).map(|e| e.status()), Some(EntryStatus::Failed));
    }

    #[test]
    fn batch_touches_only_pending_and_failed_in_order() {
        let mut store = store();
        let done = entry_with_text(&mut store, "already done");
        let p1 = entry_with_text(&mut store, "first");
        let broken = entry_with_text(&mut store, "fail here");
        let p2 = entry_with_text(&mut store, "second");
        store.generate(done).expect("generate");
        let done_name = store.get(done).and_then(|e| e.output_name()).map(String::from);

        let mut seen = Vec::new();
        let items = store.generate_all_pending_with(|item| seen.push((item.position, item.total)));

        let ids: Vec<EntryId> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![p1, broken, p2]);
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
        assert!(items[0].result.is_ok());
        assert!(items[1].result.is_err());
        assert!(items[2].result.is_ok());

        let texts: Vec<&str> = store.engine().requests.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["already done", "first", "fail here", "second"]);
        assert_eq!(
            store.get(done).and_then(|e| e.output_name()).map(String::from),
            done_name
        );
        assert_eq!(store.pending_count(), 1);
        assert_joint_presence(&store);
    }

    #[test]
    fn batch_with_nothing_pending_calls_nothing() {
        let mut store = store();
        let id = entry_with_text(&mut store, "hello");
        store.generate(id).expect("generate");

        assert!(store.generate_all_pending().is_empty());
        assert_eq!(store.engine().requests.len(), 1);
    }

    #[test]
    fn apply_voice_to_all_is_all_or_nothing() {
        let mut store = store();
        let a = entry_with_text(&mut store, "one");
        let b = entry_with_text(&mut store, "two");
        store.set_voice(b, "en-US-AriaNeural").expect("voice");

        assert!(matches!(
            store.apply_voice_to_all("bogus"),
            Err(BatchError::InvalidVoice(_))
        ));
        assert_eq!(store.get(a).map(|e| e.voice_id()), Some("en-US-SteffanNeural"));
        assert_eq!(store.get(b).map(|e| e.voice_id()), Some("en-US-AriaNeural"));

        store.generate(a).expect("generate");
        store.apply_voice_to_all("fr-FR-DeniseNeural").expect("valid");
        for entry in store.entries() {
            assert_eq!(entry.voice_id(), "fr-FR-DeniseNeural");
            assert_eq!(entry.status(), EntryStatus::Pending);
        }
    }

    #[test]
    fn interrupted_synthesis_leaves_entry_failed() {
        let catalog =
            VoiceCatalog::new(vec![voice("en-US-AriaNeural", "en-US", "Female")]).expect("catalog");
        let engine = |_: &SynthesisRequest| -> Result<Vec<u8>, Box<dyn std::error::Error>> {
            panic!("engine crashed")
        };
        let mut store = EntryStore::new(catalog, SessionConfig::default(), engine);
        let id = store.create_entry();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| store.generate(id)));
        assert!(outcome.is_err());
        let entry = store.get(id).expect("entry");
        assert_eq!(entry.status(), EntryStatus::Failed);
        assert!(entry.audio().is_none());
    }
}

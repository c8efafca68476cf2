use std::path::PathBuf;
use std::time::Instant;

use tts_batch::{
    Adjustment, EntryStore, SessionConfigBuilder, SynthesisRequest, VoiceCatalog, VoiceRecord,
};

/// Stand-in for a real synthesis client: returns the request rendered as text.
fn echo_engine(request: &SynthesisRequest) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    Ok(format!(
        "[{} rate={} volume={}] {}",
        request.voice_id, request.rate, request.volume, request.text
    )
    .into_bytes())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let voices = vec![
        VoiceRecord {
            id: "en-US-SteffanNeural".to_string(),
            locale: "en-US".to_string(),
            gender: "Male".to_string(),
            display_name: "Microsoft Steffan Online (Natural)".to_string(),
        },
        VoiceRecord {
            id: "fr-FR-DeniseNeural".to_string(),
            locale: "fr-FR".to_string(),
            gender: "Female".to_string(),
            display_name: "Microsoft Denise Online (Natural)".to_string(),
        },
    ];
    let catalog = VoiceCatalog::new(voices)?;
    for group in catalog.group_by_locale() {
        println!("{}: {} voice(s)", group.locale, group.voices.len());
    }

    let config = SessionConfigBuilder::default()
        .rate("+10%".parse::<Adjustment>()?)
        .build()?;
    let mut store = EntryStore::new(catalog, config, echo_engine);

    let texts = [
        ("Hello! This is the first entry.", "en-US-SteffanNeural"),
        ("Bonjour, voici la deuxième entrée.", "fr-FR-DeniseNeural"),
    ];
    for (text, voice) in texts {
        let id = store.create_entry();
        store.set_text(id, text)?;
        store.set_voice(id, voice)?;
    }

    let start = Instant::now();
    let items = store.generate_all_pending_with(|item| match &item.result {
        Ok(outcome) => println!(
            "[{}/{}] entry {} -> {}",
            item.position, item.total, item.id, outcome.output_name
        ),
        Err(e) => println!("[{}/{}] entry {} failed: {e}", item.position, item.total, item.id),
    });
    println!("Generated {} entries in {:.2?}", items.len(), start.elapsed());

    if store.has_downloads() {
        let path = PathBuf::from(store.archive_file_name());
        std::fs::write(&path, store.build_archive()?)?;
        println!("Saved {}", path.display());
        for file in store.export_summary().files {
            println!(
                "  {}. {} ({}, {}) {}",
                file.number, file.output_name, file.locale, file.gender, file.text_preview
            );
        }
    }
    Ok(())
}

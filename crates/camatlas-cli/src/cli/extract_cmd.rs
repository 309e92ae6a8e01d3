//! `camatlas extract` / `camatlas classify` — inspect a single page.

use anyhow::{Context, Result};
use serde_json::{json, Value};

use camatlas::{
    DocumentLoader, Engine, EngineConfig, LoadMode, LoadedPage, OutputMode, ParsedDocument,
    RenderAssessment,
};

use crate::http_loader::HttpLoader;

/// Obtain HTML from a URL (fetched statically) or a local file.
///
/// For files, `base_url` stands in for the address the page was served from.
pub async fn load_source(source: &str, base_url: Option<&str>, timeout_ms: u64) -> Result<LoadedPage> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let loader = HttpLoader::new(timeout_ms)?;
        return loader.load(source, LoadMode::Static).await;
    }
    let html = std::fs::read_to_string(source).with_context(|| format!("cannot read {source}"))?;
    Ok(LoadedPage {
        final_url: base_url.unwrap_or_default().to_string(),
        html,
        mode: LoadMode::Static,
    })
}

/// `camatlas extract`: every resolved field and its provenance for one page.
pub fn extract(config: &EngineConfig, page: &LoadedPage) -> Result<Value> {
    let engine = Engine::new(config)?;
    let doc = ParsedDocument::parse(&page.html, &page.final_url);
    let assessment = engine.classify(&doc);
    let assembly = engine.assemble(&doc);

    let provenance = |field: &camatlas::CandidateField| -> Value {
        match field.resolve() {
            Some(c) => json!({ "value": c.value, "source": c.source, "candidates": field.candidates().len() }),
            None => Value::Null,
        }
    };

    Ok(json!({
        "record": assembly.record.to_json(OutputMode::Full),
        "persistable": assembly.persistable,
        "provenance": {
            "embedUrl": provenance(&assembly.streams.embed_url),
            "contentUrl": provenance(&assembly.streams.content_url),
            "thumbnailUrl": provenance(&assembly.streams.thumbnail_url),
            "country": provenance(&assembly.location.country),
            "city": provenance(&assembly.location.city),
            "title": assembly.title_rule,
            "coordinates": assembly.record.coordinates.map(|c| c.source),
        },
        "render": assessment,
    }))
}

/// `camatlas classify`: the render heuristic for one page.
pub fn classify(config: &EngineConfig, page: &LoadedPage) -> Result<RenderAssessment> {
    let engine = Engine::new(config)?;
    let doc = ParsedDocument::parse(&page.html, &page.final_url);
    Ok(engine.classify(&doc))
}


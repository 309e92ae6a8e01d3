//! Batch orchestration: URL in, merged record out.
//!
//! Pages are processed one at a time. A failure on one URL is logged and
//! counted, and the batch moves on.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;

use crate::assembler::Engine;
use crate::classifier::RenderAssessment;
use crate::config::{EngineConfig, LocaleRewrite, PipelineConfig};
use crate::document::ParsedDocument;
use crate::error::{AtlasError, AtlasResult};
use crate::loader::{DocumentLoader, LoadMode, LoadedPage};
use crate::store::{MergeOutcome, RecordStore};
use crate::types::{CanonicalRecord, OutputMode};

/// Clean up a URL as it appears in a URL list.
///
/// Strips leading `@` markers and one pair of surrounding quotes, applies the
/// locale path rewrite, and requires an `http`/`https` scheme.
pub fn normalize_target(raw: &str, rewrite: Option<&LocaleRewrite>) -> AtlasResult<String> {
    let mut url = raw.trim().trim_start_matches('@').trim();
    for quote in ['"', '\''] {
        if url.len() >= 2 && url.starts_with(quote) && url.ends_with(quote) {
            url = url[1..url.len() - 1].trim();
        }
    }

    let url = match rewrite {
        Some(r) if !r.from.is_empty() && url.contains(&r.from) => url.replace(&r.from, &r.to),
        _ => url.to_string(),
    };

    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AtlasError::InvalidUrl(url));
    }
    Ok(url)
}

/// Non-blank, non-comment lines of a URL list file.
pub fn read_url_list(path: &Path) -> AtlasResult<Vec<String>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// URLs from every `*.txt` file in `dir`, files in name order.
pub fn read_url_dir(dir: &Path) -> AtlasResult<Vec<String>> {
    let mut files: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("txt"))
        .collect();
    files.sort();

    let mut urls = Vec::new();
    for file in &files {
        let found = read_url_list(file)?;
        tracing::debug!("{}: {} URLs", file.display(), found.len());
        urls.extend(found);
    }
    tracing::info!("Found {} URL files in {}, total URLs: {}", files.len(), dir.display(), urls.len());
    Ok(urls)
}

/// The result of processing one URL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOutcome {
    pub url: String,
    pub load_mode: LoadMode,
    pub assessment: RenderAssessment,
    pub record: CanonicalRecord,
    pub persistable: bool,
    pub merge: Option<MergeOutcome>,
}

/// Totals for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub total: usize,
    pub saved: usize,
    pub duplicates: usize,
    pub incomplete: usize,
    pub failed: usize,
}

/// Loads, extracts and stores a list of URLs.
pub struct Pipeline<L: DocumentLoader> {
    engine: Engine,
    loader: L,
    store: RecordStore,
    config: PipelineConfig,
}

impl<L: DocumentLoader> Pipeline<L> {
    pub fn new(config: &EngineConfig, loader: L, store: RecordStore) -> AtlasResult<Self> {
        Ok(Self {
            engine: Engine::new(config)?,
            loader,
            store,
            config: config.pipeline.clone(),
        })
    }

    pub fn output_mode(&self) -> OutputMode {
        self.config.output_mode
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Process one URL end to end.
    pub async fn process(&self, raw_url: &str) -> anyhow::Result<PageOutcome> {
        let url = normalize_target(raw_url, self.config.locale_rewrite.as_ref())?;

        let page = self
            .loader
            .load(&url, LoadMode::Static)
            .await
            .with_context(|| format!("failed to load {url}"))?;

        let assessment = {
            let doc = ParsedDocument::parse(&page.html, &page.final_url);
            self.engine.classify(&doc)
        };

        let page = if assessment.needs_rendering {
            self.rendered_or(page, &url).await
        } else {
            page
        };

        let assembly = {
            let doc = ParsedDocument::parse(&page.html, &page.final_url);
            self.engine.assemble(&doc)
        };

        let merge = if assembly.persistable {
            let outcome = self
                .store
                .merge(&assembly.record.country, &assembly.record, self.config.output_mode)
                .with_context(|| format!("failed to store record for {url}"))?;
            Some(outcome)
        } else {
            tracing::info!("  -> Skip: no embedUrl/contentUrl for {url}");
            None
        };

        Ok(PageOutcome {
            url,
            load_mode: page.mode,
            assessment,
            record: assembly.record,
            persistable: assembly.persistable,
            merge,
        })
    }

    /// A rendered load of `url` when the loader can render; otherwise `page`.
    async fn rendered_or(&self, page: LoadedPage, url: &str) -> LoadedPage {
        if !self.loader.supports_rendering() {
            tracing::warn!("{url} looks client-rendered but the loader cannot render; using static HTML");
            return page;
        }
        match self.loader.load(url, LoadMode::Rendered).await {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::warn!("rendered load of {url} failed: {e:#}; using static HTML");
                page
            }
        }
    }

    /// Process every URL in order. Per-URL failures never abort the batch.
    pub async fn run(&self, urls: &[String]) -> RunStats {
        let mut stats = RunStats {
            total: urls.len(),
            ..RunStats::default()
        };
        let delay = Duration::from_millis(self.config.delay_ms);

        for (idx, raw) in urls.iter().enumerate() {
            if idx > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            tracing::info!("[{}/{}] {raw}", idx + 1, urls.len());

            match self.process(raw).await {
                Ok(outcome) => match &outcome.merge {
                    Some(m) if m.appended => {
                        stats.saved += 1;
                        tracing::info!(
                            "  -> Saved to {} ({} records)",
                            self.store.path_for(&outcome.record.country).display(),
                            m.total
                        );
                    }
                    Some(_) => {
                        stats.duplicates += 1;
                        tracing::info!("  -> Duplicate, not appended");
                    }
                    None => stats.incomplete += 1,
                },
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!("  -> Error processing {raw}: {e:#}");
                }
            }
        }

        tracing::info!(
            "Done: {} saved, {} duplicates, {} incomplete, {} failed of {}",
            stats.saved,
            stats.duplicates,
            stats.incomplete,
            stats.failed,
            stats.total
        );
        stats
    }
}

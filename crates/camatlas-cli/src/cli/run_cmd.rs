//! `camatlas run` — batch extraction into per-country collections.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use camatlas::{
    read_url_dir, read_url_list, DocumentLoader, EngineConfig, OutputMode, Pipeline, RecordStore,
    RunStats,
};

use crate::http_loader::HttpLoader;

/// Options of the `run` command. `None` keeps the configured value.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub urls_file: PathBuf,
    pub urls_dir: PathBuf,
    pub out_dir: PathBuf,
    pub output_mode: Option<OutputMode>,
    pub delay_ms: Option<u64>,
    pub file_suffix: Option<String>,
    pub timeout_ms: u64,
}

/// The URL batch: every `*.txt` in `urls_dir` when that directory exists,
/// otherwise the lines of `urls_file`.
pub fn collect_urls(urls_file: &Path, urls_dir: &Path) -> Result<Vec<String>> {
    let urls = if urls_dir.is_dir() {
        read_url_dir(urls_dir)?
    } else {
        read_url_list(urls_file)
            .with_context(|| format!("cannot read URL list {}", urls_file.display()))?
    };
    if urls.is_empty() {
        bail!("no URLs found");
    }
    Ok(urls)
}

fn apply_overrides(config: &EngineConfig, opts: &RunOptions) -> EngineConfig {
    let mut config = config.clone();
    if let Some(mode) = opts.output_mode {
        config.pipeline.output_mode = mode;
    }
    if let Some(delay) = opts.delay_ms {
        config.pipeline.delay_ms = delay;
    }
    if let Some(suffix) = &opts.file_suffix {
        config.pipeline.file_suffix = suffix.clone();
    }
    config
}

/// `camatlas run`: fetch every URL over HTTP and merge the records.
pub async fn run(config: &EngineConfig, opts: &RunOptions) -> Result<RunStats> {
    let urls = collect_urls(&opts.urls_file, &opts.urls_dir)?;
    let loader = HttpLoader::new(opts.timeout_ms)?;
    run_with_loader(config, opts, loader, &urls).await
}

/// Batch run over an arbitrary loader.
pub async fn run_with_loader<L: DocumentLoader>(
    config: &EngineConfig,
    opts: &RunOptions,
    loader: L,
    urls: &[String],
) -> Result<RunStats> {
    let config = apply_overrides(config, opts);
    let store = RecordStore::open(&opts.out_dir, &config.pipeline.file_suffix);
    let pipeline = Pipeline::new(&config, loader, store)?;
    tracing::info!(
        "Processing {} URLs into {} ({:?} records)",
        urls.len(),
        opts.out_dir.display(),
        pipeline.output_mode()
    );
    Ok(pipeline.run(urls).await)
}


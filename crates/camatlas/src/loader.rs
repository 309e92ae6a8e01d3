//! Document loader abstraction.
//!
//! The engine never fetches or renders pages itself. A [`DocumentLoader`]
//! hands it raw HTML plus the URL the page finally settled on; whether that
//! HTML came from a plain HTTP GET or a headless browser is the loader's
//! business.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How a page should be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Server response as-is.
    Static,
    /// After client-side scripts have run.
    Rendered,
}

/// Result of loading a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedPage {
    /// The final URL after any redirects.
    pub final_url: String,
    pub html: String,
    /// The mode actually used, which may be `Static` when `Rendered` was asked
    /// of a loader that cannot render.
    pub mode: LoadMode,
}

/// Something that can turn a URL into HTML.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load `url` in the requested mode.
    async fn load(&self, url: &str, mode: LoadMode) -> Result<LoadedPage>;
    /// Whether [`LoadMode::Rendered`] produces anything different.
    fn supports_rendering(&self) -> bool;
}

/// Serves fixed HTML per URL. Used for offline extraction and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    pages: HashMap<String, String>,
    rendered: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the static HTML of `url`.
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Register the rendered HTML of `url`.
    pub fn with_rendered(mut self, url: &str, html: &str) -> Self {
        self.rendered.insert(url.to_string(), html.to_string());
        self
    }
}

#[async_trait]
impl DocumentLoader for MemoryLoader {
    async fn load(&self, url: &str, mode: LoadMode) -> Result<LoadedPage> {
        if mode == LoadMode::Rendered {
            if let Some(html) = self.rendered.get(url) {
                return Ok(LoadedPage {
                    final_url: url.to_string(),
                    html: html.clone(),
                    mode: LoadMode::Rendered,
                });
            }
        }
        let html = self
            .pages
            .get(url)
            .ok_or_else(|| anyhow::anyhow!("no page registered for {url}"))?;
        Ok(LoadedPage {
            final_url: url.to_string(),
            html: html.clone(),
            mode: LoadMode::Static,
        })
    }

    fn supports_rendering(&self) -> bool {
        !self.rendered.is_empty()
    }
}

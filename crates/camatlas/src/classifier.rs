//! Render necessity heuristic.
//!
//! Counts independent signs that a page's content is produced client-side.
//! The result is advisory: the pipeline asks the loader for a rendered pass
//! when enough signs are present, nothing more.

use serde::Serialize;

use crate::config::RenderConfig;
use crate::document::ParsedDocument;

/// Inline markers left by common front-end frameworks.
const INLINE_FRAMEWORK_MARKERS: &[&str] = &["__NEXT_DATA__", "__NUXT__", "/_next/"];

/// One sign of client-side rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Indicator {
    ManyScripts,
    FrameworkMarker,
    AppRoot,
    TemplateTag,
    NoscriptTag,
    ShortText,
    MissingTitle,
    MissingHeading,
    MissingDescription,
}

/// The indicators that fired and the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderAssessment {
    pub indicators: Vec<Indicator>,
    pub count: usize,
    pub needs_rendering: bool,
}

pub struct RenderClassifier {
    config: RenderConfig,
}

impl RenderClassifier {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn assess(&self, doc: &ParsedDocument) -> RenderAssessment {
        let checks = [
            (Indicator::ManyScripts, self.many_scripts(doc)),
            (Indicator::FrameworkMarker, self.framework_marker(doc)),
            (Indicator::AppRoot, self.app_root(doc)),
            (Indicator::TemplateTag, doc.select_first("template").is_some()),
            (Indicator::NoscriptTag, doc.select_first("noscript").is_some()),
            (
                Indicator::ShortText,
                doc.visible_text_len() < self.config.min_text_chars,
            ),
            (Indicator::MissingTitle, missing_title(doc)),
            (
                Indicator::MissingHeading,
                doc.select_first("h1, h2, h3, h4, h5, h6").is_none(),
            ),
            (Indicator::MissingDescription, missing_description(doc)),
        ];

        let indicators: Vec<Indicator> = checks
            .into_iter()
            .filter_map(|(indicator, fired)| fired.then_some(indicator))
            .collect();
        let count = indicators.len();
        let needs_rendering = count >= self.config.threshold;
        tracing::debug!(
            "render assessment for {}: {count} indicator(s) {:?} -> {}",
            doc.final_url(),
            indicators,
            if needs_rendering { "render" } else { "static" }
        );
        RenderAssessment {
            indicators,
            count,
            needs_rendering,
        }
    }

    fn many_scripts(&self, doc: &ParsedDocument) -> bool {
        doc.select("script").len() > self.config.max_scripts
    }

    fn framework_marker(&self, doc: &ParsedDocument) -> bool {
        let markers: Vec<String> = self
            .config
            .framework_markers
            .iter()
            .map(|m| m.to_ascii_lowercase())
            .collect();
        let tagged = doc.select("script").into_iter().any(|el| {
            ["src", "id"].iter().any(|attr| {
                el.value()
                    .attr(attr)
                    .map(|v| {
                        let v = v.to_ascii_lowercase();
                        markers.iter().any(|m| v.contains(m.as_str()))
                    })
                    .unwrap_or(false)
            })
        });
        tagged
            || doc.select_first("[ng-version]").is_some()
            || doc
                .inline_scripts()
                .iter()
                .any(|s| INLINE_FRAMEWORK_MARKERS.iter().any(|m| s.contains(m)))
    }

    fn app_root(&self, doc: &ParsedDocument) -> bool {
        doc.select("[id]").into_iter().any(|el| {
            el.value()
                .attr("id")
                .map(|id| self.config.app_root_ids.iter().any(|r| r == id))
                .unwrap_or(false)
        })
    }
}

fn missing_title(doc: &ParsedDocument) -> bool {
    doc.select_first("title")
        .map(|t| t.text().collect::<String>().trim().is_empty())
        .unwrap_or(true)
}

fn missing_description(doc: &ParsedDocument) -> bool {
    doc.select_first(r#"meta[name="description"]"#).is_none()
}

//! Record assembly: one parsed page in, one canonical record out.
//!
//! [`Engine`] owns every compiled extractor. It is built once from an
//! [`EngineConfig`] and reused for every page of a batch.

use chrono::Utc;
use serde_json::{Map, Value};

use crate::acquisition::location::{Location, LocationResolver};
use crate::acquisition::streams::{Harvester, StreamCandidates};
use crate::acquisition::structured::{first_name, parse_blocks, walk_objects};
use crate::classifier::{RenderAssessment, RenderClassifier};
use crate::config::{EngineConfig, TitleConfig};
use crate::document::{element_text, url_host_in, ParsedDocument};
use crate::error::AtlasResult;
use crate::geo::GeoResolver;
use crate::rules::{first_match, non_empty, Rule};
use crate::types::{derive_key_mapping, CanonicalRecord};

struct TitleContext<'a> {
    doc: &'a ParsedDocument,
    objects: &'a [&'a Map<String, Value>],
    config: &'a TitleConfig,
}

fn title_rules<'a>() -> [Rule<TitleContext<'a>, String>; 4] {
    [
        Rule::new("page-heading", page_heading),
        Rule::new("document-title", document_title),
        Rule::new("first-heading", first_heading),
        Rule::new("json-ld-name", json_ld_name),
    ]
}

fn page_heading(ctx: &TitleContext<'_>) -> Option<String> {
    let class = ctx.config.heading_class.trim();
    if class.is_empty() {
        return None;
    }
    let css = (1..=6)
        .map(|n| format!("h{n}.{class}"))
        .collect::<Vec<_>>()
        .join(", ");
    ctx.doc
        .select(&css)
        .into_iter()
        .find_map(|el| non_empty(element_text(&el)))
}

fn document_title(ctx: &TitleContext<'_>) -> Option<String> {
    ctx.doc
        .select_first("title")
        .and_then(|el| non_empty(element_text(&el)))
}

fn first_heading(ctx: &TitleContext<'_>) -> Option<String> {
    ctx.doc
        .select("h1, h2, h3, h4, h5, h6")
        .into_iter()
        .find_map(|el| non_empty(element_text(&el)))
}

fn json_ld_name(ctx: &TitleContext<'_>) -> Option<String> {
    first_name(ctx.objects)
}

/// Everything the engine learned about one page.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub record: CanonicalRecord,
    /// Whether the record may be merged into the store.
    pub persistable: bool,
    pub streams: StreamCandidates,
    pub location: Location,
    /// Name of the rule that produced the title, if any.
    pub title_rule: Option<&'static str>,
}

/// The compiled extraction engine.
pub struct Engine {
    harvester: Harvester,
    locations: LocationResolver,
    geo: GeoResolver,
    classifier: RenderClassifier,
    title: TitleConfig,
    content_hosts: Vec<String>,
}

impl Engine {
    /// Compile every configured pattern. Invalid configuration is reported
    /// here, never while extracting.
    pub fn new(config: &EngineConfig) -> AtlasResult<Self> {
        Ok(Self {
            harvester: Harvester::new(&config.streams)?,
            locations: LocationResolver::new(&config.location)?,
            geo: GeoResolver::new(&config.geo)?,
            classifier: RenderClassifier::new(&config.render),
            title: config.title.clone(),
            content_hosts: config.streams.content_hosts.clone(),
        })
    }

    /// Whether the document looks like it needs a rendering pass.
    pub fn classify(&self, doc: &ParsedDocument) -> RenderAssessment {
        self.classifier.assess(doc)
    }

    /// Build the canonical record for a document.
    pub fn assemble(&self, doc: &ParsedDocument) -> Assembly {
        let blocks = parse_blocks(doc);
        let objects = walk_objects(&blocks, self.harvester.max_json_depth());

        let streams = self.harvester.harvest(doc, &objects);
        let location = self.locations.resolve(doc);
        let coordinates = self.geo.resolve(doc, &objects);

        let title_ctx = TitleContext {
            doc,
            objects: &objects,
            config: &self.title,
        };
        let (title_rule, title) = match first_match(&title_rules(), &title_ctx) {
            Some((rule, title)) => (Some(rule), title),
            None => (None, String::new()),
        };

        let embed_url = doc.resolve(&streams.embed_url.value());
        let content_url = doc.resolve(&streams.content_url.value());
        let thumbnail_url = doc.resolve(&streams.thumbnail_url.value());

        let record = CanonicalRecord {
            key_mapping_data: derive_key_mapping(&thumbnail_url),
            embed_url,
            content_url,
            thumbnail_url,
            country: location.country(),
            city: location.city(),
            title,
            coordinates,
            source_url: doc.final_url().to_string(),
            captured_at: Utc::now(),
        };
        let persistable = self.is_persistable(&record);
        if !persistable {
            tracing::debug!("record for {} is not persistable", record.source_url);
        }

        Assembly {
            record,
            persistable,
            streams,
            location,
            title_rule,
        }
    }

    fn is_persistable(&self, record: &CanonicalRecord) -> bool {
        if !record.has_stream() {
            return false;
        }
        if self.content_hosts.is_empty() {
            return true;
        }
        let allowed = url_host_in(&record.content_url, &self.content_hosts);
        if !allowed {
            tracing::debug!(
                "content URL {:?} is outside the allowed hosts",
                record.content_url
            );
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;

    fn engine() -> Engine {
        Engine::new(&EngineConfig::default()).unwrap()
    }

    fn assemble(html: &str, url: &str) -> Assembly {
        let doc = ParsedDocument::parse(html, url);
        engine().assemble(&doc)
    }

    #[test]
    fn test_page_heading_beats_document_title() {
        let a = assemble(
            r#"<html><head><title>Site | Cam</title></head>
            <body><h2>Other</h2><h1 class="title page-heading"> Dragon  Bridge </h1></body></html>"#,
            "https://cams.example.com/",
        );
        assert_eq!(a.record.title, "Dragon Bridge");
        assert_eq!(a.title_rule, Some("page-heading"));
    }

    #[test]
    fn test_title_falls_back_to_heading_then_json_ld() {
        let a = assemble(
            "<html><head><title> </title></head><body><h3>Beach cam</h3></body></html>",
            "https://cams.example.com/",
        );
        assert_eq!(a.record.title, "Beach cam");
        assert_eq!(a.title_rule, Some("first-heading"));

        let a = assemble(
            r#"<html><head><script type="application/ld+json">{"@type":"VideoObject","name":"Harbour"}</script></head></html>"#,
            "https://cams.example.com/",
        );
        assert_eq!(a.record.title, "Harbour");
        assert_eq!(a.title_rule, Some("json-ld-name"));
    }

    #[test]
    fn test_relative_iframe_resolved_and_incomplete_flagged() {
        let a = assemble(
            r#"<html><body><iframe src="/player/embed/42"></iframe></body></html>"#,
            "https://cams.example.com/countries/vietnam/hue/citadel/",
        );
        // Not on the video-host allowlist, so nothing is harvested.
        assert!(a.record.embed_url.is_empty());
        assert!(!a.persistable);
        assert_eq!(a.record.country, "Vietnam");
        assert_eq!(a.record.city, "Hue");
    }

    #[test]
    fn test_relative_json_ld_url_made_absolute() {
        let a = assemble(
            r#"<html><head><script type="application/ld+json">
            {"@type":"VideoObject","contentUrl":"/streams/citadel.m3u8","thumbnailUrl":"/media/cams/7/thumbnail/large.jpg"}
            </script></head></html>"#,
            "https://cams.example.com/countries/vietnam/hue/citadel/",
        );
        assert_eq!(
            a.record.content_url,
            "https://cams.example.com/streams/citadel.m3u8"
        );
        assert_eq!(
            a.record.key_mapping_data,
            "https://cams.example.com/media/cams/7/thumbnail"
        );
        assert!(a.persistable);
        assert_eq!(a.streams.content_url.resolve().unwrap().source, SourceKind::JsonLd);
    }

    #[test]
    fn test_content_host_filter() {
        let config = EngineConfig {
            streams: crate::config::StreamConfig {
                content_hosts: vec!["youtube.com".to_string(), "youtu.be".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = Engine::new(&config).unwrap();

        let doc = ParsedDocument::parse(
            r#"<script type="application/ld+json">{"contentUrl":"https://stream.example.net/live.m3u8"}</script>"#,
            "https://cams.example.com/",
        );
        assert!(!engine.assemble(&doc).persistable);

        let doc = ParsedDocument::parse(
            r#"<iframe src="https://www.youtube.com/embed/abc123"></iframe>"#,
            "https://cams.example.com/",
        );
        let a = engine.assemble(&doc);
        assert_eq!(a.record.content_url, "https://www.youtube.com/watch?v=abc123");
        assert!(a.persistable);
    }

    #[test]
    fn test_scenario_structured_data_block() {
        let a = assemble(
            r#"<html><head><script type="application/ld+json">
            {"embedUrl":"https://youtube.com/embed/abc123","contentUrl":"https://youtube.com/watch?v=abc123","thumbnailUrl":["https://img.example/t.jpg"]}
            </script></head></html>"#,
            "https://cams.example.com/",
        );
        assert_eq!(a.record.embed_url, "https://youtube.com/embed/abc123");
        assert_eq!(a.record.content_url, "https://youtube.com/watch?v=abc123");
        assert_eq!(a.record.thumbnail_url, "https://img.example/t.jpg");
    }
}

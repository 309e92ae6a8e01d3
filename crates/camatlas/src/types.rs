//! Core data types shared by the extractors, the assembler and the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a candidate value was found on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    JsonLd,
    MetaTag,
    Iframe,
    InlineScript,
    Breadcrumb,
    PageUrl,
    Heading,
    DocumentTitle,
}

/// One value offered by one strategy for a logical field.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub source: SourceKind,
    pub value: String,
}

/// Every value offered for one logical field, in strategy-priority order.
#[derive(Debug, Clone)]
pub struct CandidateField {
    field: &'static str,
    candidates: Vec<Candidate>,
}

impl CandidateField {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            candidates: Vec::new(),
        }
    }

    /// Append a candidate. Blank values are dropped.
    pub fn push(&mut self, source: SourceKind, value: impl Into<String>) {
        let value = value.into().trim().to_string();
        if !value.is_empty() {
            self.candidates.push(Candidate { source, value });
        }
    }

    /// The first non-empty candidate.
    pub fn resolve(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    /// The resolved value, or an empty string.
    pub fn value(&self) -> String {
        self.resolve().map(|c| c.value.clone()).unwrap_or_default()
    }

    pub fn is_resolved(&self) -> bool {
        !self.candidates.is_empty()
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }
}

/// A single anchor inside a breadcrumb container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Crumb {
    pub display_text: String,
    pub href: String,
    pub title_attribute: String,
}

/// The anchors of one breadcrumb container, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreadcrumbTrail {
    pub crumbs: Vec<Crumb>,
}

/// A slippy-map tile address parsed from a tile image URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileReference {
    pub zoom: u32,
    pub tile_x: u64,
    pub tile_y: u64,
    pub source_url: String,
}

/// Rendered screen offset of an element, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerOffset {
    pub pixel_x: f64,
    pub pixel_y: f64,
}

/// Which resolver tier produced a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeoSource {
    DataAttr,
    ScriptPattern,
    TileCalc,
    MarkerRefined,
    JsonLd,
    MetaTag,
    IframeParams,
    PageUrlParams,
}

impl GeoSource {
    /// Sources computed from tile geometry rather than read from the page.
    pub fn is_tile_derived(self) -> bool {
        matches!(self, GeoSource::TileCalc | GeoSource::MarkerRefined)
    }
}

/// A latitude/longitude pair with provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: Option<u32>,
    pub source: GeoSource,
    #[serde(skip)]
    pub valid: bool,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64, zoom: Option<u32>, source: GeoSource) -> Self {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        Self {
            latitude,
            longitude,
            zoom,
            source,
            valid,
        }
    }
}

/// How much of a record is written to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// The six stream/place fields plus coordinates.
    #[default]
    Minimal,
    /// Minimal fields plus source URL, capture time and key mapping.
    Full,
}

impl std::str::FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minimal" => Ok(OutputMode::Minimal),
            "full" => Ok(OutputMode::Full),
            other => Err(format!("unknown output mode: {other}")),
        }
    }
}

/// The resolved representation of one listing page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub embed_url: String,
    pub content_url: String,
    pub thumbnail_url: String,
    pub country: String,
    pub city: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<GeoCoordinate>,
    #[serde(rename = "url")]
    pub source_url: String,
    pub captured_at: DateTime<Utc>,
    pub key_mapping_data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MinimalView<'a> {
    embed_url: &'a str,
    content_url: &'a str,
    thumbnail_url: &'a str,
    country: &'a str,
    city: &'a str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    coordinates: Option<&'a GeoCoordinate>,
}

impl CanonicalRecord {
    /// True when at least one stream URL was resolved.
    pub fn has_stream(&self) -> bool {
        !self.embed_url.is_empty() || !self.content_url.is_empty()
    }

    /// Serialize the record in the requested output mode.
    pub fn to_json(&self, mode: OutputMode) -> serde_json::Value {
        let value = match mode {
            OutputMode::Full => serde_json::to_value(self),
            OutputMode::Minimal => serde_json::to_value(MinimalView {
                embed_url: &self.embed_url,
                content_url: &self.content_url,
                thumbnail_url: &self.thumbnail_url,
                country: &self.country,
                city: &self.city,
                title: &self.title,
                coordinates: self.coordinates.as_ref(),
            }),
        };
        value.unwrap_or(serde_json::Value::Null)
    }
}

/// Prefix of a thumbnail URL up to and including its `/thumbnail` segment.
pub fn derive_key_mapping(thumbnail_url: &str) -> String {
    match thumbnail_url.find("/thumbnail") {
        Some(idx) => format!("{}/thumbnail", &thumbnail_url[..idx]),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CanonicalRecord {
        CanonicalRecord {
            embed_url: "https://www.youtube.com/embed/abc123".into(),
            content_url: String::new(),
            thumbnail_url: "https://cdn.example.com/cams/42/thumbnail/small.jpg".into(),
            country: "Vietnam".into(),
            city: "Da Nang".into(),
            title: "Dragon Bridge".into(),
            coordinates: Some(GeoCoordinate::new(16.06, 108.22, Some(14), GeoSource::TileCalc)),
            source_url: "https://example.com/countries/vietnam/da-nang/dragon-bridge/".into(),
            captured_at: Utc::now(),
            key_mapping_data: "https://cdn.example.com/cams/42/thumbnail".into(),
        }
    }

    #[test]
    fn test_candidate_field_first_non_empty_wins() {
        let mut field = CandidateField::new("embedUrl");
        field.push(SourceKind::JsonLd, "   ");
        field.push(SourceKind::Iframe, "https://a");
        field.push(SourceKind::InlineScript, "https://b");
        let resolved = field.resolve().unwrap();
        assert_eq!(resolved.source, SourceKind::Iframe);
        assert_eq!(field.value(), "https://a");
        assert_eq!(field.candidates().len(), 2);
    }

    #[test]
    fn test_geo_coordinate_validity() {
        assert!(GeoCoordinate::new(90.0, -180.0, None, GeoSource::MetaTag).valid);
        assert!(!GeoCoordinate::new(90.5, 0.0, None, GeoSource::MetaTag).valid);
        assert!(!GeoCoordinate::new(0.0, 181.0, None, GeoSource::MetaTag).valid);
        assert!(!GeoCoordinate::new(f64::NAN, 0.0, None, GeoSource::MetaTag).valid);
    }

    #[test]
    fn test_minimal_view_omits_provenance() {
        let json = record().to_json(OutputMode::Minimal);
        assert_eq!(json["embedUrl"], "https://www.youtube.com/embed/abc123");
        assert_eq!(json["coordinates"]["source"], "tile-calc");
        assert_eq!(json["coordinates"]["zoom"], 14);
        assert!(json.get("url").is_none());
        assert!(json.get("capturedAt").is_none());
        assert!(json["coordinates"].get("valid").is_none());
    }

    #[test]
    fn test_full_view_includes_provenance() {
        let json = record().to_json(OutputMode::Full);
        assert_eq!(
            json["url"],
            "https://example.com/countries/vietnam/da-nang/dragon-bridge/"
        );
        assert!(json["capturedAt"].is_string());
        assert_eq!(
            json["keyMappingData"],
            "https://cdn.example.com/cams/42/thumbnail"
        );
    }

    #[test]
    fn test_derive_key_mapping() {
        assert_eq!(
            derive_key_mapping("https://x.io/a/thumbnail/1.jpg"),
            "https://x.io/a/thumbnail"
        );
        assert_eq!(derive_key_mapping("https://x.io/a/poster.jpg"), "");
    }

    #[test]
    fn test_output_mode_from_str() {
        assert_eq!("FULL".parse::<OutputMode>().unwrap(), OutputMode::Full);
        assert!("compact".parse::<OutputMode>().is_err());
    }
}

//! Coordinate patterns scanned over inline scripts.
//!
//! Every pattern names its groups `lat`, `lng` and optionally `zoom`, so a
//! pattern that sees longitude first still binds each number to the right
//! axis.

use regex::Regex;

use crate::error::AtlasResult;

/// Signed decimal.
const NUM: &str = r"-?\d{1,3}(?:\.\d+)?";

/// `(name, pattern)` in priority order; `{n}` is replaced by [`NUM`].
const SCRIPT_PATTERNS: &[(&str, &str)] = &[
    (
        "json-lat-lng-active",
        r#"\{\s*"lat"\s*:\s*(?P<lat>{n})\s*,\s*"lng"\s*:\s*(?P<lng>{n})\s*,\s*"active"\s*:\s*(?:true|false)\s*\}"#,
    ),
    ("json-lat-lng", r#""lat"\s*:\s*(?P<lat>{n})\s*,\s*"lng"\s*:\s*(?P<lng>{n})"#),
    ("json-lng-lat", r#""lng"\s*:\s*(?P<lng>{n})\s*,\s*"lat"\s*:\s*(?P<lat>{n})"#),
    ("json-lat-lon", r#""lat"\s*:\s*(?P<lat>{n})\s*,\s*"lon"\s*:\s*(?P<lng>{n})"#),
    ("json-lon-lat", r#""lon"\s*:\s*(?P<lng>{n})\s*,\s*"lat"\s*:\s*(?P<lat>{n})"#),
    (
        "escaped-lat-lng",
        r#"\\"lat\\"\s*:\s*(?P<lat>{n})[^\n\r]*?\\"lng\\"\s*:\s*(?P<lng>{n})"#,
    ),
    (
        "escaped-lng-lat",
        r#"\\"lng\\"\s*:\s*(?P<lng>{n})[^\n\r]*?\\"lat\\"\s*:\s*(?P<lat>{n})"#,
    ),
    (
        "leaflet-map-center",
        r#"L\.map\(\s*["'][^"']+["']\s*,\s*\{\s*center\s*:\s*\[\s*(?P<lat>{n})\s*,\s*(?P<lng>{n})\s*\](?:\s*,\s*zoom\s*:\s*(?P<zoom>\d{1,2}))?"#,
    ),
    (
        "leaflet-set-view",
        r#"setView\(\s*\[\s*(?P<lat>{n})\s*,\s*(?P<lng>{n})\s*\]\s*,\s*(?P<zoom>\d{1,2})"#,
    ),
    (
        "center-array",
        r#"["']?center["']?\s*:\s*\[\s*(?P<lat>{n})\s*,\s*(?P<lng>{n})\s*\]"#,
    ),
    (
        "js-lat-lng",
        r#"\blat\s*[:=]\s*(?P<lat>{n})[,;\s]+(?:(?:var|let|const)\s+)?lng\s*[:=]\s*(?P<lng>{n})"#,
    ),
    (
        "js-lat-lon",
        r#"\blat\s*[:=]\s*(?P<lat>{n})[,;\s]+(?:(?:var|let|const)\s+)?lon\s*[:=]\s*(?P<lng>{n})"#,
    ),
    (
        "google-maps-latlng",
        r#"google\.maps\.LatLng\(\s*(?P<lat>{n})\s*,\s*(?P<lng>{n})\s*\)"#,
    ),
    (
        "osm-url-params",
        r#"openstreetmap\.org[^"'\s]*?[?&]m?lat=(?P<lat>{n})&(?:amp;)?m?lon=(?P<lng>{n})(?:&(?:amp;)?zoom=(?P<zoom>\d{1,2}))?"#,
    ),
    (
        "osm-url-fragment",
        r#"openstreetmap\.org[^"'\s]*?#map=(?P<zoom>\d{1,2})/(?P<lat>{n})/(?P<lng>{n})"#,
    ),
    (
        "json-latitude-longitude",
        r#""latitude"\s*:\s*(?P<lat>{n})\s*,\s*"longitude"\s*:\s*(?P<lng>{n})"#,
    ),
    (
        "escaped-latitude-longitude",
        r#"\\"latitude\\"\s*:\s*(?P<lat>{n})\s*,\s*\\"longitude\\"\s*:\s*(?P<lng>{n})"#,
    ),
];

/// Tried once against the whole serialized document when no script matched.
const DOCUMENT_FALLBACK: &str = r#""lat"\s*:\s*(?P<lat>{n})[^\n\r]{0,200}?"lng"\s*:\s*(?P<lng>{n})"#;

/// A coordinate pair found by a script pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptHit {
    pub pattern: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: Option<u32>,
}

/// The compiled script patterns.
#[derive(Debug, Clone)]
pub struct ScriptPatterns {
    ordered: Vec<(&'static str, Regex)>,
    fallback: Regex,
}

impl ScriptPatterns {
    pub fn compile() -> AtlasResult<Self> {
        let ordered = SCRIPT_PATTERNS
            .iter()
            .map(|(name, pattern)| Ok((*name, Regex::new(&pattern.replace("{n}", NUM))?)))
            .collect::<AtlasResult<Vec<_>>>()?;
        let fallback = Regex::new(&DOCUMENT_FALLBACK.replace("{n}", NUM))?;
        Ok(Self { ordered, fallback })
    }

    /// First hit, scripts in document order, patterns in priority order
    /// within each script.
    pub fn scan<S: AsRef<str>>(&self, scripts: &[S]) -> Option<ScriptHit> {
        scripts.iter().find_map(|script| {
            self.ordered
                .iter()
                .find_map(|(name, re)| hit_from(name, re, script.as_ref()))
        })
    }

    /// The loose `"lat" … "lng"` pattern over arbitrary text.
    pub fn scan_document(&self, text: &str) -> Option<ScriptHit> {
        hit_from("document-lat-lng", &self.fallback, text)
    }
}

fn hit_from(name: &'static str, re: &Regex, text: &str) -> Option<ScriptHit> {
    let caps = re.captures(text)?;
    let latitude: f64 = caps.name("lat")?.as_str().parse().ok()?;
    let longitude: f64 = caps.name("lng")?.as_str().parse().ok()?;
    let zoom = caps.name("zoom").and_then(|z| z.as_str().parse().ok());
    tracing::debug!("coordinate pattern '{name}' matched: {latitude}, {longitude}");
    Some(ScriptHit {
        pattern: name,
        latitude,
        longitude,
        zoom,
    })
}

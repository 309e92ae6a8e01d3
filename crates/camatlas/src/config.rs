//! Engine configuration.
//!
//! Every heuristic that depends on the target site (breadcrumb path shape,
//! video hosts, plausibility box, render thresholds) lives here so it can be
//! recalibrated without code changes. Configuration is JSON, resolved from an
//! explicit path, then `CAMATLAS_CONFIG`, then `./camatlas.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, AtlasResult};
use crate::types::OutputMode;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "CAMATLAS_CONFIG";

/// Configuration file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "camatlas.json";

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub location: LocationConfig,
    pub streams: StreamConfig,
    pub geo: GeoConfig,
    pub render: RenderConfig,
    pub title: TitleConfig,
    pub pipeline: PipelineConfig,
}

impl EngineConfig {
    /// Read a configuration file. Missing sections take their defaults.
    pub fn from_file(path: &Path) -> AtlasResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            AtlasError::Config(format!("{}: {e}", path.display()))
        })
    }

    /// Resolve and load the configuration, falling back to defaults.
    pub fn load(explicit: Option<&str>) -> AtlasResult<Self> {
        match resolve_config_path(explicit) {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }
}

/// Resolve the configuration file path.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        if !env_path.trim().is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let cwd = PathBuf::from(DEFAULT_CONFIG_FILE);
    cwd.exists().then_some(cwd)
}

/// Breadcrumb / URL hierarchy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocationConfig {
    /// Path template naming the country and city levels,
    /// e.g. `/countries/{country}/{city}`.
    pub path_pattern: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            path_pattern: "/countries/{country}/{city}".to_string(),
        }
    }
}

/// A video host the harvester recognises.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoHost {
    pub name: String,
    /// Host names (subdomains match too).
    pub domains: Vec<String>,
    /// Hosts whose whole path is the content id (e.g. `youtu.be`).
    pub short_domains: Vec<String>,
    /// Path fragment that marks an embed URL; the id follows it.
    pub embed_marker: String,
    /// Canonical content URL; `{id}` is replaced by the content id.
    pub watch_template: String,
    /// Canonical embed URL; `{id}` is replaced by the content id.
    pub embed_template: String,
    /// Regexes with an `id` capture group, scanned over inline scripts.
    pub id_patterns: Vec<String>,
}

impl Default for VideoHost {
    fn default() -> Self {
        Self {
            name: String::new(),
            domains: Vec::new(),
            short_domains: Vec::new(),
            embed_marker: "/embed/".to_string(),
            watch_template: String::new(),
            embed_template: String::new(),
            id_patterns: Vec::new(),
        }
    }
}

impl VideoHost {
    pub fn youtube() -> Self {
        Self {
            name: "youtube".to_string(),
            domains: vec![
                "youtube.com".to_string(),
                "youtu.be".to_string(),
                "youtube-nocookie.com".to_string(),
            ],
            short_domains: vec!["youtu.be".to_string()],
            embed_marker: "/embed/".to_string(),
            watch_template: "https://www.youtube.com/watch?v={id}".to_string(),
            embed_template: "https://www.youtube.com/embed/{id}".to_string(),
            id_patterns: vec![
                r"youtube\.com/watch\?v=(?P<id>[A-Za-z0-9_-]+)".to_string(),
                r"youtu\.be/(?P<id>[A-Za-z0-9_-]+)".to_string(),
                r"youtube(?:-nocookie)?\.com/embed/(?P<id>[A-Za-z0-9_-]+)".to_string(),
            ],
        }
    }

    pub fn vimeo() -> Self {
        Self {
            name: "vimeo".to_string(),
            domains: vec!["vimeo.com".to_string()],
            short_domains: Vec::new(),
            embed_marker: "/video/".to_string(),
            watch_template: "https://vimeo.com/{id}".to_string(),
            embed_template: "https://player.vimeo.com/video/{id}".to_string(),
            id_patterns: vec![r"player\.vimeo\.com/video/(?P<id>[0-9]+)".to_string()],
        }
    }
}

/// Structured Data Harvester settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamConfig {
    pub video_hosts: Vec<VideoHost>,
    /// When non-empty, thumbnail meta tags must point at one of these hosts.
    pub thumbnail_hosts: Vec<String>,
    /// When non-empty, records whose content URL is on another host are not persisted.
    pub content_hosts: Vec<String>,
    /// Nesting limit for structured-data traversal.
    pub max_json_depth: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            video_hosts: vec![VideoHost::youtube(), VideoHost::vimeo()],
            thumbnail_hosts: Vec::new(),
            content_hosts: Vec::new(),
            max_json_depth: 64,
        }
    }
}

/// Latitude/longitude rectangle, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude)
            && (self.min_lon..=self.max_lon).contains(&longitude)
    }

    /// The whole Web Mercator world.
    pub fn world() -> Self {
        Self {
            min_lat: -90.0,
            max_lat: 90.0,
            min_lon: -180.0,
            max_lon: 180.0,
        }
    }
}

impl Default for BoundingBox {
    /// The region the tile arithmetic was validated against (Vietnam).
    fn default() -> Self {
        Self {
            min_lat: 8.0,
            max_lat: 23.0,
            min_lon: 102.0,
            max_lon: 110.0,
        }
    }
}

/// Which coordinates the plausibility box applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoxScope {
    /// Only coordinates computed from map tiles.
    #[default]
    TileDerived,
    /// Every coordinate regardless of tier.
    All,
    /// Never applied.
    Off,
}

/// Geospatial Coordinate Resolver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeoConfig {
    pub plausibility_box: BoundingBox,
    pub box_scope: BoxScope,
    /// Hosts whose iframes carry `lat`/`lon` query parameters.
    pub map_hosts: Vec<String>,
    /// Edge length of one map tile in CSS pixels.
    pub tile_size: f64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            plausibility_box: BoundingBox::default(),
            box_scope: BoxScope::default(),
            map_hosts: vec![
                "openstreetmap.org".to_string(),
                "osm.org".to_string(),
                "maps.google.com".to_string(),
                "google.com".to_string(),
            ],
            tile_size: 256.0,
        }
    }
}

impl GeoConfig {
    /// Whether `coord` passes the plausibility box under the configured scope.
    pub fn is_plausible(&self, coord: &crate::types::GeoCoordinate) -> bool {
        if !coord.valid {
            return false;
        }
        let applies = match self.box_scope {
            BoxScope::Off => false,
            BoxScope::All => true,
            BoxScope::TileDerived => coord.source.is_tile_derived(),
        };
        !applies
            || self
                .plausibility_box
                .contains(coord.latitude, coord.longitude)
    }
}

/// Render Necessity Classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    /// More script tags than this counts as an indicator.
    pub max_scripts: usize,
    /// Less visible text than this counts as an indicator.
    pub min_text_chars: usize,
    /// Indicator count at which rendering is advised.
    pub threshold: usize,
    /// Substrings of a script's `src` or `id` that mark a front-end framework.
    pub framework_markers: Vec<String>,
    /// Element ids used as single-page-app mount points.
    pub app_root_ids: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_scripts: 5,
            min_text_chars: 1000,
            threshold: 3,
            framework_markers: vec![
                "next".to_string(),
                "nuxt".to_string(),
                "react".to_string(),
                "vue".to_string(),
                "angular".to_string(),
            ],
            app_root_ids: vec![
                "root".to_string(),
                "app".to_string(),
                "__next".to_string(),
                "__nuxt".to_string(),
            ],
        }
    }
}

/// Title resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TitleConfig {
    /// Class of the dedicated page heading.
    pub heading_class: String,
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            heading_class: "page-heading".to_string(),
        }
    }
}

/// A literal path fragment replaced in target URLs before loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleRewrite {
    pub from: String,
    pub to: String,
}

/// Batch pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    pub locale_rewrite: Option<LocaleRewrite>,
    /// Pause between consecutive URLs.
    pub delay_ms: u64,
    pub output_mode: OutputMode,
    /// Appended to the store key to form the file stem.
    pub file_suffix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            locale_rewrite: Some(LocaleRewrite {
                from: "/vi/".to_string(),
                to: "/en/".to_string(),
            }),
            delay_ms: 2000,
            output_mode: OutputMode::Minimal,
            file_suffix: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoCoordinate, GeoSource};

    #[test]
    fn test_partial_config_keeps_defaults() {
        let cfg: EngineConfig = serde_json::from_str(
            r#"{"location": {"pathPattern": "/cams/{country}/{city}"}, "render": {"threshold": 4}}"#,
        )
        .unwrap();
        assert_eq!(cfg.location.path_pattern, "/cams/{country}/{city}");
        assert_eq!(cfg.render.threshold, 4);
        assert_eq!(cfg.render.max_scripts, 5);
        assert_eq!(cfg.streams.video_hosts.len(), 2);
        assert_eq!(cfg.title.heading_class, "page-heading");
    }

    #[test]
    fn test_box_scope_tile_derived_only() {
        let geo = GeoConfig::default();
        let far_tile = GeoCoordinate::new(47.4, 13.4, Some(14), GeoSource::TileCalc);
        let far_script = GeoCoordinate::new(47.4, 13.4, None, GeoSource::ScriptPattern);
        assert!(!geo.is_plausible(&far_tile));
        assert!(geo.is_plausible(&far_script));
    }

    #[test]
    fn test_box_scope_all_and_off() {
        let far = GeoCoordinate::new(47.4, 13.4, None, GeoSource::MetaTag);
        let all = GeoConfig {
            box_scope: BoxScope::All,
            ..GeoConfig::default()
        };
        let off = GeoConfig {
            box_scope: BoxScope::Off,
            ..GeoConfig::default()
        };
        assert!(!all.is_plausible(&far));
        assert!(off.is_plausible(&far));
        let invalid = GeoCoordinate::new(95.0, 13.4, None, GeoSource::MetaTag);
        assert!(!off.is_plausible(&invalid));
    }

    #[test]
    fn test_from_file_reports_bad_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            EngineConfig::from_file(&path),
            Err(AtlasError::Config(_))
        ));
    }

    #[test]
    fn test_explicit_path_wins() {
        let resolved = resolve_config_path(Some("/etc/camatlas/site.json"));
        assert_eq!(resolved, Some(PathBuf::from("/etc/camatlas/site.json")));
    }
}

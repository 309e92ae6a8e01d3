//! Geospatial coordinate resolution.
//!
//! Tiers run in a fixed order and the first plausible coordinate wins:
//!
//! 1. `data-lat` / `data-lng` attributes on map containers
//! 2. Coordinate patterns in inline scripts, then the whole document
//! 3. Map tile inversion, refined by the marker position when one is rendered
//! 4. JSON-LD `geo` / `location` objects
//! 5. `geo.*` / `ICBM` meta tags
//! 6. `lat` / `lon` query parameters of map iframes, then of the page URL
//!
//! A tier that finds nothing, or finds something the plausibility box
//! rejects, falls through to the next one. No tier ever errors.

pub mod patterns;
pub mod tiles;

use serde_json::{Map, Value};
use url::Url;

use crate::acquisition::structured::number_like;
use crate::config::GeoConfig;
use crate::document::{url_host_in, ParsedDocument};
use crate::error::AtlasResult;
use crate::rules::{first_accepted, Rule};
use crate::types::{GeoCoordinate, GeoSource, MarkerOffset, TileReference};

use self::patterns::ScriptPatterns;

const MAP_CONTAINERS: &str =
    "#mapContainer, .leaflet-container, [class*=map], [data-lat], [data-latitude]";
const TILE_IMAGES: &str = "img.leaflet-tile, .leaflet-tile-container img, img[class*=tile]";
const MARKERS: &str = "img.leaflet-marker-icon, .leaflet-marker-icon";

/// Everything a tier may look at.
pub struct GeoContext<'a> {
    pub doc: &'a ParsedDocument,
    pub objects: &'a [&'a Map<String, Value>],
    patterns: &'a ScriptPatterns,
    config: &'a GeoConfig,
}

fn tiers<'a>() -> [Rule<GeoContext<'a>, GeoCoordinate>; 9] {
    [
        Rule::new("data-attributes", from_data_attributes),
        Rule::new("script-patterns", from_scripts),
        Rule::new("document-pattern", from_document_text),
        Rule::new("marker-refined", from_marker),
        Rule::new("tile-corner", from_tile_corner),
        Rule::new("json-ld", from_json_ld),
        Rule::new("meta-tags", from_meta),
        Rule::new("iframe-params", from_iframe_params),
        Rule::new("page-url-params", from_page_url),
    ]
}

/// Resolves the optional coordinate of a listing page.
#[derive(Debug, Clone)]
pub struct GeoResolver {
    config: GeoConfig,
    patterns: ScriptPatterns,
}

impl GeoResolver {
    pub fn new(config: &GeoConfig) -> AtlasResult<Self> {
        Ok(Self {
            config: config.clone(),
            patterns: ScriptPatterns::compile()?,
        })
    }

    /// The first plausible coordinate, or `None`.
    pub fn resolve(
        &self,
        doc: &ParsedDocument,
        objects: &[&Map<String, Value>],
    ) -> Option<GeoCoordinate> {
        let ctx = GeoContext {
            doc,
            objects,
            patterns: &self.patterns,
            config: &self.config,
        };
        let hit = first_accepted(&tiers(), &ctx, |coord| {
            let ok = self.config.is_plausible(coord);
            if !ok {
                tracing::debug!(
                    "discarding implausible {:?} coordinate {}, {}",
                    coord.source,
                    coord.latitude,
                    coord.longitude
                );
            }
            ok
        });
        hit.map(|(rule, coord)| {
            tracing::debug!(
                "coordinate from {rule}: {}, {}",
                coord.latitude,
                coord.longitude
            );
            coord
        })
    }
}

// ── Tier 1: data attributes ─────────────────────────────────────────────

fn from_data_attributes(ctx: &GeoContext<'_>) -> Option<GeoCoordinate> {
    ctx.doc.select(MAP_CONTAINERS).into_iter().find_map(|el| {
        let attr = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| el.value().attr(n))
                .and_then(|v| v.trim().parse::<f64>().ok())
        };
        let lat = attr(&["data-lat", "data-latitude"])?;
        let lng = attr(&["data-lng", "data-lon", "data-longitude"])?;
        let zoom = el
            .value()
            .attr("data-zoom")
            .and_then(|z| z.trim().parse::<u32>().ok());
        Some(GeoCoordinate::new(lat, lng, zoom, GeoSource::DataAttr))
    })
}

// ── Tier 2: script patterns ─────────────────────────────────────────────

fn from_scripts(ctx: &GeoContext<'_>) -> Option<GeoCoordinate> {
    let scripts: Vec<String> = ctx
        .doc
        .select(r#"script:not([type="application/ld+json"])"#)
        .into_iter()
        .map(|el| el.text().collect::<String>())
        .filter(|t| !t.trim().is_empty())
        .collect();
    let hit = ctx.patterns.scan(&scripts)?;
    Some(GeoCoordinate::new(
        hit.latitude,
        hit.longitude,
        hit.zoom,
        GeoSource::ScriptPattern,
    ))
}

fn from_document_text(ctx: &GeoContext<'_>) -> Option<GeoCoordinate> {
    let hit = ctx.patterns.scan_document(ctx.doc.source())?;
    Some(GeoCoordinate::new(
        hit.latitude,
        hit.longitude,
        hit.zoom,
        GeoSource::ScriptPattern,
    ))
}

// ── Tier 3: tiles ───────────────────────────────────────────────────────

struct RenderedTile {
    tile: TileReference,
    offset: Option<MarkerOffset>,
}

fn rendered_tiles(doc: &ParsedDocument) -> Vec<RenderedTile> {
    doc.select(TILE_IMAGES)
        .into_iter()
        .filter_map(|el| {
            let src = el
                .value()
                .attr("src")
                .filter(|s| !s.trim().is_empty())
                .or_else(|| el.value().attr("data-src"))?;
            let tile = tiles::parse_tile_url(src)?;
            let offset = el.value().attr("style").and_then(tiles::parse_offset);
            Some(RenderedTile { tile, offset })
        })
        .collect()
}

fn from_marker(ctx: &GeoContext<'_>) -> Option<GeoCoordinate> {
    let marker = ctx
        .doc
        .select(MARKERS)
        .into_iter()
        .find_map(|el| el.value().attr("style").and_then(tiles::parse_offset))?;
    let rendered = rendered_tiles(ctx.doc);
    let (tile, tile_offset) = rendered
        .iter()
        .find_map(|t| t.offset.map(|offset| (&t.tile, offset)))?;
    let (lat, lng) = tiles::refine_with_marker(tile, tile_offset, marker, ctx.config.tile_size);
    Some(GeoCoordinate::new(
        lat,
        lng,
        Some(tile.zoom),
        GeoSource::MarkerRefined,
    ))
}

fn from_tile_corner(ctx: &GeoContext<'_>) -> Option<GeoCoordinate> {
    let first = rendered_tiles(ctx.doc).into_iter().next()?;
    let t = first.tile;
    let (lat, lng) = tiles::tile_to_lat_lon(t.tile_x as f64, t.tile_y as f64, t.zoom);
    Some(GeoCoordinate::new(lat, lng, Some(t.zoom), GeoSource::TileCalc))
}

// ── Tier 4: JSON-LD ─────────────────────────────────────────────────────

fn from_json_ld(ctx: &GeoContext<'_>) -> Option<GeoCoordinate> {
    ctx.objects.iter().find_map(|obj| {
        ["geo", "location"]
            .iter()
            .filter_map(|key| obj.get(*key))
            .find_map(geo_object)
    })
}

/// `latitude`/`longitude` of a geo-ish value: the object itself, its nested
/// `geo`, or the first such item of a list.
fn geo_object(value: &Value) -> Option<GeoCoordinate> {
    match value {
        Value::Object(map) => {
            let direct = map
                .get("latitude")
                .and_then(number_like)
                .zip(map.get("longitude").and_then(number_like));
            match direct {
                Some((lat, lng)) => Some(GeoCoordinate::new(lat, lng, None, GeoSource::JsonLd)),
                None => match map.get("geo") {
                    Some(Value::Object(geo)) => geo
                        .get("latitude")
                        .and_then(number_like)
                        .zip(geo.get("longitude").and_then(number_like))
                        .map(|(lat, lng)| GeoCoordinate::new(lat, lng, None, GeoSource::JsonLd)),
                    _ => None,
                },
            }
        }
        Value::Array(items) => items.iter().find_map(geo_object),
        _ => None,
    }
}

// ── Tier 5: meta tags ───────────────────────────────────────────────────

fn from_meta(ctx: &GeoContext<'_>) -> Option<GeoCoordinate> {
    let doc = ctx.doc;
    let pair = doc
        .meta("geo.position")
        .and_then(|v| parse_pair(&v))
        .or_else(|| doc.meta("ICBM").and_then(|v| parse_pair(&v)))
        .or_else(|| {
            let lat = doc.meta("geo.position-latitude")?.parse().ok()?;
            let lng = doc.meta("geo.position-longitude")?.parse().ok()?;
            Some((lat, lng))
        })
        .or_else(|| doc.meta("geo.coordinates").and_then(|v| parse_pair(&v)))?;
    Some(GeoCoordinate::new(pair.0, pair.1, None, GeoSource::MetaTag))
}

/// `"lat;lon"` or `"lat, lon"`.
fn parse_pair(raw: &str) -> Option<(f64, f64)> {
    let mut parts = raw.split([';', ',']).map(str::trim);
    let lat = parts.next()?.parse().ok()?;
    let lng = parts.next()?.parse().ok()?;
    Some((lat, lng))
}

// ── Tier 6: query parameters ────────────────────────────────────────────

fn from_iframe_params(ctx: &GeoContext<'_>) -> Option<GeoCoordinate> {
    ctx.doc.select("iframe").into_iter().find_map(|el| {
        let src = ctx.doc.resolve(el.value().attr("src")?);
        if !url_host_in(&src, &ctx.config.map_hosts) {
            return None;
        }
        query_coordinate(&src, GeoSource::IframeParams)
    })
}

fn from_page_url(ctx: &GeoContext<'_>) -> Option<GeoCoordinate> {
    query_coordinate(ctx.doc.final_url(), GeoSource::PageUrlParams)
}

/// Coordinate from `lat` + `lon`/`lng` (or `mlat`/`mlon`) query parameters,
/// or a `lat,lng` pair in `ll`, `center`, `marker` or `q`.
fn query_coordinate(raw: &str, source: GeoSource) -> Option<GeoCoordinate> {
    let url = Url::parse(raw).ok()?;
    let param = |names: &[&str]| {
        names.iter().find_map(|name| {
            url.query_pairs()
                .find(|(k, _)| k == *name)
                .map(|(_, v)| v.into_owned())
        })
    };
    let zoom = param(&["zoom", "z"]).and_then(|z| z.trim().parse::<u32>().ok());

    let separate = param(&["lat", "mlat"])
        .and_then(|v| v.trim().parse::<f64>().ok())
        .zip(param(&["lon", "lng", "mlon"]).and_then(|v| v.trim().parse::<f64>().ok()));
    let (lat, lng) = separate.or_else(|| param(&["ll", "center", "marker", "q"]).and_then(|v| parse_pair(&v)))?;
    Some(GeoCoordinate::new(lat, lng, zoom, source))
}

//! Slippy-map tile arithmetic (Web Mercator).
//!
//! Tile `(x, y)` at zoom `z` covers `1/2^z` of the world in each axis, with
//! `(0, 0)` at the north-west corner. Fractional indices address points
//! inside a tile, which is how a marker's pixel offset becomes a coordinate.

use std::f64::consts::PI;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::{MarkerOffset, TileReference};

/// Zoom levels above this are not produced by any tile server.
pub const MAX_ZOOM: u32 = 30;

/// Added to fractional tile indices before flooring so a point computed from
/// a tile corner stays in that tile.
const FLOOR_EPSILON: f64 = 1e-9;

/// North-west corner of tile `(x, y)` at `zoom`, as `(latitude, longitude)`.
///
/// Accepts fractional indices.
pub fn tile_to_lat_lon(tile_x: f64, tile_y: f64, zoom: u32) -> (f64, f64) {
    let n = 2f64.powi(zoom as i32);
    let longitude = tile_x / n * 360.0 - 180.0;
    let latitude = (PI * (1.0 - 2.0 * tile_y / n)).sinh().atan().to_degrees();
    (latitude, longitude)
}

/// The tile containing `(latitude, longitude)` at `zoom`.
///
/// Latitudes beyond the Mercator limit clamp to the edge rows. A point on a
/// tile corner belongs to the tile it is the north-west corner of.
pub fn lat_lon_to_tile(latitude: f64, longitude: f64, zoom: u32) -> (u64, u64) {
    let n = 2f64.powi(zoom as i32);
    let lat_rad = latitude.to_radians();
    let x = (longitude + 180.0) / 360.0 * n;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;
    let max = n - 1.0;
    let index = |v: f64| (v + FLOOR_EPSILON).floor().clamp(0.0, max) as u64;
    (index(x), index(y))
}

fn tile_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)/(?P<z>\d{1,2})/(?P<x>\d+)/(?P<y>\d+)(?:@2x)?\.(?:png|jpe?g|webp)(?:[?#].*)?$",
        )
        .expect("tile url regex is valid")
    })
}

/// Parse `…/{zoom}/{x}/{y}.{png|jpg|jpeg|webp}` into a tile address.
///
/// Indices outside the zoom level's grid are rejected.
pub fn parse_tile_url(src: &str) -> Option<TileReference> {
    let caps = tile_url_regex().captures(src.trim())?;
    let zoom: u32 = caps["z"].parse().ok()?;
    let tile_x: u64 = caps["x"].parse().ok()?;
    let tile_y: u64 = caps["y"].parse().ok()?;
    if zoom > MAX_ZOOM {
        return None;
    }
    let edge = 1u64 << zoom;
    if tile_x >= edge || tile_y >= edge {
        tracing::debug!("tile index out of range for zoom {zoom}: {src}");
        return None;
    }
    Some(TileReference {
        zoom,
        tile_x,
        tile_y,
        source_url: src.trim().to_string(),
    })
}

fn offset_regexes() -> &'static [Regex; 3] {
    static RE: OnceLock<[Regex; 3]> = OnceLock::new();
    RE.get_or_init(|| {
        let compile = |p: &str| Regex::new(p).expect("offset regex is valid");
        [
            compile(r"translate3d\(\s*(?P<x>-?[0-9.]+)(?:px)?\s*,\s*(?P<y>-?[0-9.]+)(?:px)?"),
            compile(r"translate\(\s*(?P<x>-?[0-9.]+)(?:px)?\s*,\s*(?P<y>-?[0-9.]+)(?:px)?"),
            compile(r"left:\s*(?P<x>-?[0-9.]+)px;\s*top:\s*(?P<y>-?[0-9.]+)px"),
        ]
    })
}

/// Rendered pixel offset from an inline `style` attribute.
///
/// Reads `translate3d(x, y, z)`, then `translate(x, y)`, then `left`/`top`.
pub fn parse_offset(style: &str) -> Option<MarkerOffset> {
    offset_regexes().iter().find_map(|re| {
        let caps = re.captures(style)?;
        let pixel_x: f64 = caps["x"].parse().ok()?;
        let pixel_y: f64 = caps["y"].parse().ok()?;
        (pixel_x.is_finite() && pixel_y.is_finite()).then_some(MarkerOffset { pixel_x, pixel_y })
    })
}

/// Coordinate of a marker placed relative to a reference tile.
///
/// The pixel delta between the marker and the tile's top-left corner is
/// converted to a fractional tile index in units of `tile_size` pixels.
pub fn refine_with_marker(
    tile: &TileReference,
    tile_offset: MarkerOffset,
    marker: MarkerOffset,
    tile_size: f64,
) -> (f64, f64) {
    let fx = tile.tile_x as f64 + (marker.pixel_x - tile_offset.pixel_x) / tile_size;
    let fy = tile.tile_y as f64 + (marker.pixel_y - tile_offset.pixel_y) / tile_size;
    tile_to_lat_lon(fx, fy, tile.zoom)
}

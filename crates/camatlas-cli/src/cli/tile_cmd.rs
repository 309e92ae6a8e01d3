//! `camatlas tile` — slippy-map tile arithmetic.

use anyhow::{bail, Result};
use serde_json::{json, Value};

use camatlas::geo::tiles::{lat_lon_to_tile, tile_to_lat_lon, MAX_ZOOM};

/// `camatlas tile`: corner and centre of a tile, or the tile holding a point.
pub fn run(zoom: u32, x: Option<u64>, y: Option<u64>, point: Option<(f64, f64)>) -> Result<Value> {
    if zoom > MAX_ZOOM {
        bail!("zoom {zoom} exceeds {MAX_ZOOM}");
    }
    match (x, y, point) {
        (Some(x), Some(y), _) => {
            let (lat, lon) = tile_to_lat_lon(x as f64, y as f64, zoom);
            let (clat, clon) = tile_to_lat_lon(x as f64 + 0.5, y as f64 + 0.5, zoom);
            Ok(json!({
                "zoom": zoom, "x": x, "y": y,
                "corner": { "latitude": lat, "longitude": lon },
                "center": { "latitude": clat, "longitude": clon },
            }))
        }
        (_, _, Some((lat, lon))) => {
            let (x, y) = lat_lon_to_tile(lat, lon, zoom);
            Ok(json!({ "zoom": zoom, "x": x, "y": y }))
        }
        _ => bail!("give either --x and --y or --lat and --lon"),
    }
}

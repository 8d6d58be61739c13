//! Tile geometry.
//!
//! Converts geographic extents into the set of Web Mercator (slippy map)
//! tiles covering them. Each [`Tile`] carries its id and its own bounding
//! box, which is what the API's `bbox` parameter is built from.

mod types;

pub use types::{Extent, Tile, TileCoord, TileError, MAX_LAT, MAX_ZOOM, MIN_LAT};

use std::f64::consts::PI;

/// Converts geographic coordinates to tile coordinates.
///
/// Latitudes outside the Web Mercator range are clamped to it; longitudes
/// are clamped to `[-180, 180]`. The antimeridian maps to the last column.
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, TileError> {
    if zoom > MAX_ZOOM {
        return Err(TileError::InvalidZoom(zoom));
    }
    if !lat.is_finite() || !lon.is_finite() {
        return Err(TileError::InvalidPoint { lat, lon });
    }

    let lat = lat.clamp(MIN_LAT, MAX_LAT);
    let lon = lon.clamp(-180.0, 180.0);
    let n = 2.0_f64.powi(zoom as i32);
    let max_index = (n as u32).saturating_sub(1);

    let x = ((lon + 180.0) / 360.0 * n) as u32;

    let lat_rad = lat * PI / 180.0;
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n) as u32;

    Ok(TileCoord {
        x: x.min(max_index),
        y: y.min(max_index),
        z: zoom,
    })
}

/// Returns the `(lat, lon)` of a tile's northwest corner.
#[inline]
pub fn tile_to_lat_lon(x: u32, y: u32, z: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(z as i32);
    let lon = x as f64 / n * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan();
    (lat_rad * 180.0 / PI, lon)
}

/// Computes every tile at `zoom` intersecting `extent`, row by row.
///
/// No buffer is added around the extent.
pub fn tiles_covering(extent: &Extent, zoom: u8) -> Result<Vec<Tile>, TileError> {
    // North-west corner has the smallest row, south-east the largest.
    let top_left = to_tile_coords(extent.max[1], extent.min[0], zoom)?;
    let bottom_right = to_tile_coords(extent.min[1], extent.max[0], zoom)?;

    let mut tiles = Vec::new();
    for y in top_left.y..=bottom_right.y {
        for x in top_left.x..=bottom_right.x {
            tiles.push(Tile::new(TileCoord { x, y, z: zoom }));
        }
    }
    Ok(tiles)
}

#[cfg(test)]
mod tests;

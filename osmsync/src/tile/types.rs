//! Tile and extent types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Deepest zoom level the tile math accepts.
pub const MAX_ZOOM: u8 = 22;

/// Slippy-map tile coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Column, 0 at the antimeridian going east
    pub x: u32,
    /// Row, 0 at the north edge
    pub y: u32,
    /// Zoom level
    pub z: u8,
}

impl TileCoord {
    /// Cache key of the tile: `"x,y,z"`.
    pub fn id(&self) -> String {
        format!("{},{},{}", self.x, self.y, self.z)
    }

    /// Geographic bounding box of the tile.
    pub fn extent(&self) -> Extent {
        let (north, west) = super::tile_to_lat_lon(self.x, self.y, self.z);
        let (south, east) = super::tile_to_lat_lon(self.x + 1, self.y + 1, self.z);
        Extent::new([west, south], [east, north])
    }
}

/// Axis-aligned geographic box. Points are `[lon, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Extent {
    /// Creates an extent, normalizing the corner order.
    pub fn new(a: [f64; 2], b: [f64; 2]) -> Self {
        Self {
            min: [a[0].min(b[0]), a[1].min(b[1])],
            max: [a[0].max(b[0]), a[1].max(b[1])],
        }
    }

    /// Degenerate extent covering a single point.
    pub fn from_point(p: [f64; 2]) -> Self {
        Self { min: p, max: p }
    }

    /// `minlon,minlat,maxlon,maxlat`, the API's `bbox` parameter format.
    pub fn to_param(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min[0], self.min[1], self.max[0], self.max[1]
        )
    }

    /// True if `p` lies inside or on the border.
    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] >= self.min[0] && p[0] <= self.max[0] && p[1] >= self.min[1] && p[1] <= self.max[1]
    }

    /// Center point.
    pub fn center(&self) -> [f64; 2] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
        ]
    }
}

/// A tile together with its cache key and bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub coord: TileCoord,
    pub id: String,
    pub extent: Extent,
}

impl Tile {
    pub fn new(coord: TileCoord) -> Self {
        Self {
            id: coord.id(),
            extent: coord.extent(),
            coord,
        }
    }
}

/// Errors that can occur during tile computation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TileError {
    #[error("Invalid zoom level: {0} (max {max})", max = MAX_ZOOM)]
    InvalidZoom(u8),
    #[error("Invalid point: lat {lat}, lon {lon}")]
    InvalidPoint { lat: f64, lon: f64 },
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

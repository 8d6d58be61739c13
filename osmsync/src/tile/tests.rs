//! Tests for tile geometry

use super::*;

#[test]
fn test_new_york_city_at_zoom_16() {
    // New York City: 40.7128°N, 74.0060°W
    let tile = to_tile_coords(40.7128, -74.0060, 16).unwrap();
    assert_eq!(tile.y, 24640);
    assert_eq!(tile.x, 19295);
    assert_eq!(tile.z, 16);
}

#[test]
fn test_equator_prime_meridian() {
    // At zoom 1: 2×2 tiles, 0°N 0°E is the top-left corner of tile (1, 1)
    let tile = to_tile_coords(0.0, 0.0, 1).unwrap();
    assert_eq!((tile.x, tile.y), (1, 1));
}

#[test]
fn test_poles_are_clamped() {
    let north = to_tile_coords(90.0, 0.0, 4).unwrap();
    let south = to_tile_coords(-90.0, 0.0, 4).unwrap();
    assert_eq!(north.y, 0);
    assert_eq!(south.y, 15);
}

#[test]
fn test_antimeridian_maps_to_last_column() {
    let tile = to_tile_coords(0.0, 180.0, 3).unwrap();
    assert_eq!(tile.x, 7);
}

#[test]
fn test_invalid_zoom() {
    assert_eq!(
        to_tile_coords(0.0, 0.0, 30),
        Err(TileError::InvalidZoom(30))
    );
}

#[test]
fn test_nan_is_rejected() {
    assert!(matches!(
        to_tile_coords(f64::NAN, 0.0, 3),
        Err(TileError::InvalidPoint { .. })
    ));
}

#[test]
fn test_tile_id_format() {
    let coord = TileCoord { x: 3, y: 5, z: 16 };
    assert_eq!(coord.id(), "3,5,16");
    assert_eq!(Tile::new(coord).id, "3,5,16");
}

#[test]
fn test_tile_extent_contains_its_center() {
    let coord = to_tile_coords(51.5074, -0.1278, 16).unwrap();
    let extent = coord.extent();
    assert!(extent.contains([-0.1278, 51.5074]));
    assert!(extent.min[0] < extent.max[0]);
    assert!(extent.min[1] < extent.max[1]);

    // Neighbours share an edge
    let east = TileCoord {
        x: coord.x + 1,
        ..coord
    }
    .extent();
    assert!((east.min[0] - extent.max[0]).abs() < 1e-12);
}

#[test]
fn test_extent_to_param() {
    let extent = Extent::new([1.5, -2.0], [-3.0, 4.25]);
    assert_eq!(extent.to_param(), "-3,-2,1.5,4.25");
}

#[test]
fn test_tiles_covering_single_tile() {
    let coord = to_tile_coords(40.7128, -74.0060, 16).unwrap();
    let inner = coord.extent();
    let center = inner.center();
    let small = Extent::new(
        [center[0] - 1e-6, center[1] - 1e-6],
        [center[0] + 1e-6, center[1] + 1e-6],
    );

    let tiles = tiles_covering(&small, 16).unwrap();
    assert_eq!(tiles.len(), 1);
    assert_eq!(tiles[0].coord, coord);
}

#[test]
fn test_tiles_covering_spans_grid() {
    let a = TileCoord { x: 10, y: 20, z: 6 }.extent().center();
    let b = TileCoord { x: 12, y: 21, z: 6 }.extent().center();
    let tiles = tiles_covering(&Extent::new(a, b), 6).unwrap();

    assert_eq!(tiles.len(), 6);
    let ids: Vec<_> = tiles.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["10,20,6", "11,20,6", "12,20,6", "10,21,6", "11,21,6", "12,21,6"]
    );
}

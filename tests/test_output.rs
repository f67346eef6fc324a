mod common;

use common::*;
use crowncount::output::{crown_feature_id, tile_feature_id};
use crowncount::{CoordinateMapper, GeoJsonWriter, RasterTiles, VectorWriter};

/// Tile loop as run by the command line driver
fn run(tile_size: u32) -> (GeoJsonWriter, GeoJsonWriter, usize) {
    let rgb = forest_tile(48, 32, &[(6, 6), (20, 10), (40, 24)]);
    let t = AffineTransform::north_up(350_000.0, 5_800_000.0, 0.2, 0.2).unwrap();
    let mapper = CoordinateMapper::new(t);
    let counter = TreeCounter::default();

    let mut trees = GeoJsonWriter::new();
    let mut rectangles = GeoJsonWriter::new();
    let mut total = 0;
    for tile in RasterTiles::new(rgb, None, t, tile_size).unwrap() {
        let tile = tile.unwrap();
        let result = counter.count_tile(&tile).unwrap();
        rectangles
            .write_polygon(tile_feature_id(tile.index), &tile.bounding_ring())
            .unwrap();
        for (nr, blob) in result.blobs().iter().enumerate() {
            let point = mapper.to_geographic(tile.upper_left, blob.centroid);
            trees.write_point(crown_feature_id(tile.index, nr), point).unwrap();
        }
        total += result.count();
    }
    (trees, rectangles, total)
}

#[test]
fn test_every_crown_becomes_a_point() {
    let (trees, rectangles, total) = run(16);
    assert_eq!(total, 3);
    assert_eq!(trees.len(), 3);
    assert_eq!(rectangles.len(), 6);
}

#[test]
fn test_points_land_on_crown_centres() {
    let (trees, _, _) = run(16);
    let value = trees.to_value();
    let mut xs: Vec<(f64, f64)> = value["features"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| {
            let c = &f["geometry"]["coordinates"];
            (c[0].as_f64().unwrap(), c[1].as_f64().unwrap())
        })
        .collect();
    xs.sort_by(|a, b| a.0.total_cmp(&b.0));

    // Crown (20, 10): x = 350000 + 20 * 0.2, y = 5800000 - 10 * 0.2
    assert!(near(xs[1].0, xs[1].1, 350_004.0, 5_799_998.0, 0.2));
}

#[test]
fn test_crown_ids_follow_tile_ids() {
    let (trees, _, _) = run(16);
    let value = trees.to_value();
    for feature in value["features"].as_array().unwrap() {
        let id = feature["properties"]["id"].as_u64().unwrap();
        // Crowns are numbered from zero inside each tile block.
        assert!(id % 1000 < 10);
    }
}

#[test]
fn test_saved_collections_parse_back() {
    let dir = tempfile::TempDir::new().unwrap();
    let (trees, rectangles, _) = run(16);
    let trees_path = dir.path().join("trees.geojson");
    let rect_path = dir.path().join("rectangles.geojson");
    trees.save(&trees_path).unwrap();
    rectangles.save(&rect_path).unwrap();

    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&rect_path).unwrap()).unwrap();
    let first = &parsed["features"][0];
    assert_eq!(first["geometry"]["type"], "Polygon");
    let ring = first["geometry"]["coordinates"][0].as_array().unwrap();
    assert_eq!(ring.len(), 5);
    assert_eq!(ring[0], ring[4]);
    assert_eq!(first["properties"]["id"], 0);
}

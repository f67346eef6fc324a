use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_circle_mut};
use serde_json::{Value, json};

use crate::models::{Blob, GeoPoint};

/// Ids reserved for the crowns of one tile
pub const IDS_PER_TILE: u64 = 1000;

/// Id of a tile's bounding rectangle
pub fn tile_feature_id(tile_index: usize) -> u64 {
    tile_index as u64 * IDS_PER_TILE
}

/// Id of the `nr`-th crown found in a tile
pub fn crown_feature_id(tile_index: usize, nr: usize) -> u64 {
    tile_feature_id(tile_index) + nr as u64
}

/// True when a tile has more crowns than its id block can number
pub fn crown_ids_overflow(crowns: usize) -> bool {
    crowns as u64 > IDS_PER_TILE
}

/// Sink for georeferenced crown points and tile rectangles
pub trait VectorWriter {
    fn write_point(&mut self, id: u64, point: GeoPoint) -> anyhow::Result<()>;

    /// `ring` is a closed ring (first vertex repeated last)
    fn write_polygon(&mut self, id: u64, ring: &[GeoPoint]) -> anyhow::Result<()>;
}

/// Collects features in memory and writes a GeoJSON FeatureCollection
#[derive(Debug, Default)]
pub struct GeoJsonWriter {
    features: Vec<Value>,
}

impl GeoJsonWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn to_value(&self) -> Value {
        json!({
            "type": "FeatureCollection",
            "features": self.features,
        })
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(&self.to_value())?;
        std::fs::write(path, text)
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))?;
        Ok(())
    }

    fn push(&mut self, id: u64, geometry: Value) {
        self.features.push(json!({
            "type": "Feature",
            "geometry": geometry,
            "properties": { "id": id },
        }));
    }
}

impl VectorWriter for GeoJsonWriter {
    fn write_point(&mut self, id: u64, point: GeoPoint) -> anyhow::Result<()> {
        self.push(
            id,
            json!({ "type": "Point", "coordinates": [point.x, point.y] }),
        );
        Ok(())
    }

    fn write_polygon(&mut self, id: u64, ring: &[GeoPoint]) -> anyhow::Result<()> {
        if ring.len() < 4 || ring.first() != ring.last() {
            return Err(anyhow::anyhow!(
                "Polygon {} needs a closed ring of at least 4 vertices",
                id
            ));
        }
        let coords: Vec<[f64; 2]> = ring.iter().map(|p| [p.x, p.y]).collect();
        self.push(id, json!({ "type": "Polygon", "coordinates": [coords] }));
        Ok(())
    }
}

/// Copy of the tile with a red circle of each blob's size around its centroid
pub fn draw_keypoints(rgb: &RgbImage, blobs: &[Blob]) -> RgbImage {
    let mut canvas = rgb.clone();
    let red = Rgb([255u8, 0, 0]);
    for blob in blobs {
        let center = (
            blob.centroid.x.round() as i32,
            blob.centroid.y.round() as i32,
        );
        let radius = blob.radius().round().max(1.0) as i32;
        draw_hollow_circle_mut(&mut canvas, center, radius, red);
        draw_cross_mut(&mut canvas, red, center.0, center.1);
    }
    canvas
}

use serde::Serialize;

/// Position inside a tile, in pixels. `x` grows to the right, `y` downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &PixelPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Absolute (possibly fractional) position in the source raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RasterIndex {
    pub row: f64,
    pub col: f64,
}

impl RasterIndex {
    pub fn new(row: f64, col: f64) -> Self {
        Self { row, col }
    }

    /// Shift by a tile-local point. Rows follow `y` and columns follow `x`.
    ///
    /// Every crossing from tile pixels into raster indices goes through here.
    pub fn offset_by(&self, local: PixelPoint) -> RasterIndex {
        RasterIndex {
            row: self.row + local.y,
            col: self.col + local.x,
        }
    }
}

/// A real-world coordinate in the raster's CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub x: f64,
    pub y: f64,
}

impl GeoPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A connected region of foreground pixels at one threshold level.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub label: u32,
    pub pixel_count: u32,
    /// Mean pixel position.
    pub centroid: PixelPoint,
    /// `4π·A / P²` over the outer border polygon.
    pub circularity: f64,
    /// Border polygon area over convex hull area.
    pub convexity: f64,
    /// Minor over major axis of the moment ellipse, in `[0, 1]`.
    pub inertia_ratio: f64,
}

impl Component {
    pub fn area(&self) -> u32 {
        self.pixel_count
    }

    /// Diameter of the disc with the same pixel area.
    pub fn equivalent_diameter(&self) -> f64 {
        2.0 * (self.pixel_count as f64 / std::f64::consts::PI).sqrt()
    }

    pub fn radius(&self) -> f64 {
        self.equivalent_diameter() / 2.0
    }
}

/// A candidate tree crown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Blob {
    /// Centroid in tile-local pixel coordinates.
    pub centroid: PixelPoint,
    /// Mean equivalent diameter in pixels.
    pub size: f64,
    /// Mean inertia ratio, 1 for a perfectly round blob.
    pub response: f64,
    /// Number of threshold levels that contributed to this blob.
    pub repeatability: usize,
}

impl Blob {
    pub fn radius(&self) -> f64 {
        self.size / 2.0
    }
}

/// Blobs detected in one tile.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionResult {
    blobs: Vec<Blob>,
}

impl DetectionResult {
    pub fn new(blobs: Vec<Blob>) -> Self {
        Self { blobs }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn blobs(&self) -> &[Blob] {
        &self.blobs
    }

    pub fn centroids(&self) -> Vec<PixelPoint> {
        self.blobs.iter().map(|b| b.centroid).collect()
    }

    pub fn into_blobs(self) -> Vec<Blob> {
        self.blobs
    }
}

//! Pixel <-> geographic conversion.
//!
//! Coefficients follow the rasterio ordering:
//!
//! ```text
//! x = a * col + b * row + c
//! y = d * col + e * row + f
//! ```
//!
//! For a north-up raster `e` is negative, which is where the downward row
//! axis turns into an upward geographic `y`.

use std::path::Path;

use crate::error::{DetectionError, Result};
use crate::models::{GeoPoint, PixelPoint, RasterIndex};

/// Invertible 2D affine transform from raster indices to geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl AffineTransform {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<Self> {
        let determinant = a * e - b * d;
        if !determinant.is_finite() || determinant.abs() < f64::EPSILON {
            return Err(DetectionError::DegenerateTransform { determinant });
        }
        Ok(Self { a, b, c, d, e, f })
    }

    /// Pixel indices used as coordinates, `y` pointing down.
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 0.0,
            e: 1.0,
            f: 0.0,
        }
    }

    /// North-up raster with square-or-not pixels anchored at its upper-left corner
    pub fn north_up(
        origin_x: f64,
        origin_y: f64,
        pixel_width: f64,
        pixel_height: f64,
    ) -> Result<Self> {
        Self::new(pixel_width, 0.0, origin_x, 0.0, -pixel_height, origin_y)
    }

    /// From a GDAL geotransform `[c, a, b, f, d, e]`
    pub fn from_gdal(gt: [f64; 6]) -> Result<Self> {
        Self::new(gt[1], gt[2], gt[0], gt[4], gt[5], gt[3])
    }

    /// Parse an ESRI world file body (lines A, D, B, E, C, F).
    ///
    /// C and F locate the centre of the upper-left pixel; they are moved to
    /// its outer corner.
    pub fn from_world_file_str(text: &str) -> Result<Self> {
        let values: Vec<f64> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| {
                l.parse::<f64>().map_err(|_| {
                    DetectionError::invalid_config(format!("invalid world file value '{}'", l))
                })
            })
            .collect::<Result<_>>()?;

        let [a, d, b, e, c, f] = values[..] else {
            return Err(DetectionError::invalid_config(format!(
                "world file needs 6 values, found {}",
                values.len()
            )));
        };

        Self::new(a, b, c - 0.5 * a - 0.5 * b, d, e, f - 0.5 * d - 0.5 * e)
    }

    pub fn from_world_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_world_file_str(&text)
    }

    pub fn coefficients(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// Raster index to geographic coordinate
    pub fn forward(&self, index: RasterIndex) -> GeoPoint {
        GeoPoint::new(
            self.a * index.col + self.b * index.row + self.c,
            self.d * index.col + self.e * index.row + self.f,
        )
    }

    /// Geographic coordinate to fractional raster index
    pub fn inverse(&self, point: GeoPoint) -> RasterIndex {
        let det = self.determinant();
        let dx = point.x - self.c;
        let dy = point.y - self.f;
        RasterIndex::new(
            (self.a * dy - self.d * dx) / det,
            (self.e * dx - self.b * dy) / det,
        )
    }
}

/// Two-hop tile-local -> geographic mapping.
///
/// The tile origin is known in geographic units and the blob only in tile
/// pixels, so the origin is first taken back into raster space, shifted by
/// the blob, and then transformed forward again.
pub fn to_geographic(
    tile_origin: GeoPoint,
    transform: &AffineTransform,
    pixel: PixelPoint,
) -> GeoPoint {
    let origin = transform.inverse(tile_origin);
    transform.forward(origin.offset_by(pixel))
}

/// Maps blob centroids of tiles cut from one raster
#[derive(Debug, Clone, Copy)]
pub struct CoordinateMapper {
    transform: AffineTransform,
}

impl CoordinateMapper {
    pub fn new(transform: AffineTransform) -> Self {
        Self { transform }
    }

    pub fn transform(&self) -> &AffineTransform {
        &self.transform
    }

    pub fn to_geographic(&self, tile_origin: GeoPoint, pixel: PixelPoint) -> GeoPoint {
        to_geographic(tile_origin, &self.transform, pixel)
    }

    /// Same mapping when the tile's raster offset is already known
    pub fn pixel_to_geographic(&self, tile_offset: RasterIndex, pixel: PixelPoint) -> GeoPoint {
        self.transform.forward(tile_offset.offset_by(pixel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: GeoPoint, b: GeoPoint) -> bool {
        (a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6
    }

    #[test]
    fn test_north_up_forward() {
        let t = AffineTransform::north_up(500_000.0, 6_000_000.0, 0.25, 0.25).unwrap();
        let p = t.forward(RasterIndex::new(4.0, 8.0));
        assert_eq!(p, GeoPoint::new(500_002.0, 5_999_999.0));
    }

    #[test]
    fn test_inverse_undoes_forward() {
        let t = AffineTransform::new(0.5, 0.1, 100.0, -0.2, -0.5, 200.0).unwrap();
        let idx = RasterIndex::new(12.25, 7.5);
        let back = t.inverse(t.forward(idx));
        assert!((back.row - idx.row).abs() < 1e-9);
        assert!((back.col - idx.col).abs() < 1e-9);
    }

    #[test]
    fn test_local_offset_moves_along_axes() {
        let t = AffineTransform::north_up(1000.0, 2000.0, 2.0, 2.0).unwrap();
        let origin = t.forward(RasterIndex::new(10.0, 20.0));
        // +x is +col (east), +y is +row (south).
        let p = to_geographic(origin, &t, PixelPoint::new(3.0, 1.0));
        assert!(close(p, GeoPoint::new(origin.x + 6.0, origin.y - 2.0)));
    }

    #[test]
    fn test_mapper_paths_agree() {
        let t = AffineTransform::new(0.3, 0.05, 10.0, 0.02, -0.3, 50.0).unwrap();
        let mapper = CoordinateMapper::new(t);
        let offset = RasterIndex::new(256.0, 512.0);
        let origin = t.forward(offset);
        let pixel = PixelPoint::new(17.5, 3.25);
        assert!(close(
            mapper.to_geographic(origin, pixel),
            mapper.pixel_to_geographic(offset, pixel)
        ));
    }

    #[test]
    fn test_degenerate_rejected() {
        assert!(matches!(
            AffineTransform::new(1.0, 2.0, 0.0, 2.0, 4.0, 0.0),
            Err(DetectionError::DegenerateTransform { .. })
        ));
    }

    #[test]
    fn test_gdal_ordering() {
        let t = AffineTransform::from_gdal([300.0, 0.5, 0.0, 900.0, 0.0, -0.5]).unwrap();
        assert_eq!(t.coefficients(), [0.5, 0.0, 300.0, 0.0, -0.5, 900.0]);
    }

    #[test]
    fn test_world_file_shifts_to_corner() {
        let text = "0.5\n0.0\n0.0\n-0.5\n1000.25\n2000.75\n";
        let t = AffineTransform::from_world_file_str(text).unwrap();
        assert_eq!(t.forward(RasterIndex::new(0.0, 0.0)), GeoPoint::new(1000.0, 2001.0));
    }

    #[test]
    fn test_world_file_needs_six_values() {
        assert!(AffineTransform::from_world_file_str("1\n0\n0\n-1\n").is_err());
        assert!(AffineTransform::from_world_file_str("1\n0\n0\n-1\nx\n0\n").is_err());
    }
}

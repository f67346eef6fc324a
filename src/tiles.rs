use image::{GrayImage, Luma, RgbImage, imageops};

use crate::coordinates::AffineTransform;
use crate::error::{DetectionError, Result};
use crate::models::{GeoPoint, RasterIndex};

/// One window of the source raster, ready for counting
#[derive(Debug, Clone)]
pub struct Tile {
    /// Sequential position in the tile source
    pub index: usize,
    pub rgb: RgbImage,
    /// Non-zero pixels are forest
    pub forest_mask: GrayImage,
    /// Column of the tile's first pixel in the source raster
    pub col_offset: u32,
    /// Row of the tile's first pixel in the source raster
    pub row_offset: u32,
    pub upper_left: GeoPoint,
    pub lower_right: GeoPoint,
}

impl Tile {
    /// Build a tile from raw interleaved RGB and mask buffers.
    ///
    /// Buffer lengths must match `width x height`, otherwise the tile is
    /// rejected with a shape mismatch.
    pub fn from_raw(width: u32, height: u32, rgb: Vec<u8>, forest_mask: Vec<u8>) -> Result<Self> {
        let pixels = width as usize * height as usize;
        if rgb.len() != pixels * 3 {
            return Err(DetectionError::ShapeMismatch {
                expected: format!("{}x{}x3 ({} bytes)", width, height, pixels * 3),
                actual: format!("{} bytes", rgb.len()),
            });
        }
        if forest_mask.len() != pixels {
            return Err(DetectionError::ShapeMismatch {
                expected: format!("{}x{} ({} bytes)", width, height, pixels),
                actual: format!("{} bytes", forest_mask.len()),
            });
        }
        let rgb = RgbImage::from_raw(width, height, rgb)
            .ok_or_else(|| DetectionError::shape_mismatch((width, height), (0, 0)))?;
        let forest_mask = GrayImage::from_raw(width, height, forest_mask)
            .ok_or_else(|| DetectionError::shape_mismatch((width, height), (0, 0)))?;
        Ok(Self::standalone(rgb, forest_mask))
    }

    /// A tile not cut from any raster: index 0, identity georeferencing
    pub fn standalone(rgb: RgbImage, forest_mask: GrayImage) -> Self {
        let (w, h) = rgb.dimensions();
        Self {
            index: 0,
            rgb,
            forest_mask,
            col_offset: 0,
            row_offset: 0,
            upper_left: GeoPoint::new(0.0, 0.0),
            lower_right: GeoPoint::new(w as f64, h as f64),
        }
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    /// Raster index of the tile's upper-left pixel corner
    pub fn raster_offset(&self) -> RasterIndex {
        RasterIndex::new(self.row_offset as f64, self.col_offset as f64)
    }

    /// Closed ring `[UL, UR, LR, LL, UL]` of the tile's bounding rectangle
    pub fn bounding_ring(&self) -> Vec<GeoPoint> {
        let ul = self.upper_left;
        let lr = self.lower_right;
        vec![
            ul,
            GeoPoint::new(lr.x, ul.y),
            lr,
            GeoPoint::new(ul.x, lr.y),
            ul,
        ]
    }
}

/// Lazy, finite sequence of tiles
pub trait TileSource: Iterator<Item = Result<Tile>> {}

impl<T: Iterator<Item = Result<Tile>>> TileSource for T {}

/// Row-major windowed iteration over an in-memory raster
pub struct RasterTiles {
    rgb: RgbImage,
    forest_mask: Option<GrayImage>,
    transform: AffineTransform,
    tile_size: u32,
    next_index: usize,
}

impl RasterTiles {
    pub fn new(
        rgb: RgbImage,
        forest_mask: Option<GrayImage>,
        transform: AffineTransform,
        tile_size: u32,
    ) -> Result<Self> {
        if tile_size == 0 {
            return Err(DetectionError::invalid_config("tile_size must be positive"));
        }
        if let Some(mask) = &forest_mask {
            if mask.dimensions() != rgb.dimensions() {
                return Err(DetectionError::shape_mismatch(rgb.dimensions(), mask.dimensions()));
            }
        }
        Ok(Self {
            rgb,
            forest_mask,
            transform,
            tile_size,
            next_index: 0,
        })
    }

    pub fn transform(&self) -> &AffineTransform {
        &self.transform
    }

    fn tiles_per_row(&self) -> u32 {
        self.rgb.width().div_ceil(self.tile_size)
    }

    /// Total number of tiles this source yields
    pub fn tile_count(&self) -> usize {
        let rows = self.rgb.height().div_ceil(self.tile_size);
        (self.tiles_per_row() * rows) as usize
    }

    fn cut(&self, index: usize) -> Tile {
        let per_row = self.tiles_per_row() as usize;
        let col = (index % per_row) as u32 * self.tile_size;
        let row = (index / per_row) as u32 * self.tile_size;
        let w = self.tile_size.min(self.rgb.width() - col);
        let h = self.tile_size.min(self.rgb.height() - row);

        let rgb = imageops::crop_imm(&self.rgb, col, row, w, h).to_image();
        let forest_mask = match &self.forest_mask {
            Some(mask) => imageops::crop_imm(mask, col, row, w, h).to_image(),
            // Without a mask source the whole tile is forest.
            None => GrayImage::from_pixel(w, h, Luma([255])),
        };

        Tile {
            index,
            rgb,
            forest_mask,
            col_offset: col,
            row_offset: row,
            upper_left: self
                .transform
                .forward(RasterIndex::new(row as f64, col as f64)),
            lower_right: self
                .transform
                .forward(RasterIndex::new((row + h) as f64, (col + w) as f64)),
        }
    }
}

impl Iterator for RasterTiles {
    type Item = Result<Tile>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.tile_count() {
            return None;
        }
        let tile = self.cut(self.next_index);
        self.next_index += 1;
        Some(Ok(tile))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.tile_count().saturating_sub(self.next_index);
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_edge_tiles_are_cropped() {
        let rgb = RgbImage::from_pixel(10, 7, Rgb([1, 2, 3]));
        let tiles: Vec<Tile> = RasterTiles::new(rgb, None, AffineTransform::identity(), 4)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(tiles.len(), 6);
        let last = &tiles[5];
        assert_eq!((last.col_offset, last.row_offset), (8, 4));
        assert_eq!((last.width(), last.height()), (2, 3));
        assert_eq!(last.forest_mask.dimensions(), (2, 3));
        assert!(tiles.iter().enumerate().all(|(i, t)| t.index == i));
    }

    #[test]
    fn test_corners_follow_transform() {
        let rgb = RgbImage::new(8, 8);
        let t = AffineTransform::north_up(100.0, 500.0, 0.5, 0.5).unwrap();
        let tiles: Vec<Tile> = RasterTiles::new(rgb, None, t, 4)
            .unwrap()
            .map(|t| t.unwrap())
            .collect();
        let second = &tiles[1];
        assert_eq!(second.upper_left, GeoPoint::new(102.0, 500.0));
        assert_eq!(second.lower_right, GeoPoint::new(104.0, 498.0));
        assert_eq!(second.bounding_ring().len(), 5);
        assert_eq!(second.bounding_ring()[1], GeoPoint::new(104.0, 500.0));
    }

    #[test]
    fn test_mask_is_cropped_with_tile() {
        let rgb = RgbImage::new(4, 2);
        let mask = GrayImage::from_fn(4, 2, |x, _| Luma([if x >= 2 { 255 } else { 0 }]));
        let tiles: Vec<Tile> = RasterTiles::new(rgb, Some(mask), AffineTransform::identity(), 2)
            .unwrap()
            .map(|t| t.unwrap())
            .collect();
        assert!(tiles[0].forest_mask.pixels().all(|p| p[0] == 0));
        assert!(tiles[1].forest_mask.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_mask_size_checked() {
        let result = RasterTiles::new(
            RgbImage::new(4, 4),
            Some(GrayImage::new(4, 5)),
            AffineTransform::identity(),
            2,
        );
        assert!(matches!(result, Err(DetectionError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_zero_tile_size_rejected() {
        let result = RasterTiles::new(RgbImage::new(4, 4), None, AffineTransform::identity(), 0);
        assert!(matches!(result, Err(DetectionError::InvalidConfig { .. })));
    }

    #[test]
    fn test_from_raw_checks_lengths() {
        assert!(Tile::from_raw(2, 2, vec![0; 12], vec![1; 4]).is_ok());
        assert!(matches!(
            Tile::from_raw(2, 2, vec![0; 11], vec![1; 4]),
            Err(DetectionError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            Tile::from_raw(2, 2, vec![0; 12], vec![1; 6]),
            Err(DetectionError::ShapeMismatch { .. })
        ));
    }
}

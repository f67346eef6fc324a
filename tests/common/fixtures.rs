use image::{GrayImage, Luma, Rgb, RgbImage};

/// Ground colour: bright enough to vanish after inversion and thresholding
pub const GROUND: Rgb<u8> = Rgb([230, 230, 230]);

/// Crown colour: dark enough to survive as foreground
pub const CROWN: Rgb<u8> = Rgb([20, 40, 20]);

/// Binary mask with filled squares of side `side` centred on each `(cx, cy)`
pub fn square_mask(width: u32, height: u32, squares: &[(u32, u32, u32)]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for &(cx, cy, side) in squares {
        let half = side / 2;
        for y in cy - half..cy - half + side {
            for x in cx - half..cx - half + side {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }
    mask
}

/// Binary mask with the given pixels set
pub fn pixel_mask(width: u32, height: u32, pixels: &[(u32, u32)]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for &(x, y) in pixels {
        mask.put_pixel(x, y, Luma([255]));
    }
    mask
}

/// RGB tile of bare ground with dark 3x3 crowns centred on `crowns`
pub fn forest_tile(width: u32, height: u32, crowns: &[(u32, u32)]) -> RgbImage {
    let mut rgb = RgbImage::from_pixel(width, height, GROUND);
    for &(cx, cy) in crowns {
        for y in cy - 1..=cy + 1 {
            for x in cx - 1..=cx + 1 {
                rgb.put_pixel(x, y, CROWN);
            }
        }
    }
    rgb
}

/// Forest mask covering the whole tile
pub fn all_forest(width: u32, height: u32) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([255]))
}

/// Forest mask with no forest at all
pub fn no_forest(width: u32, height: u32) -> GrayImage {
    GrayImage::new(width, height)
}

/// True if `(x, y)` is within `tol` pixels of `(ex, ey)`
pub fn near(x: f64, y: f64, ex: f64, ey: f64, tol: f64) -> bool {
    (x - ex).hypot(y - ey) <= tol
}

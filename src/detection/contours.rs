use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use imageproc::region_labelling::{Connectivity, connected_components};
use std::collections::HashMap;
use std::f64::consts::PI;

use crate::models::{Component, PixelPoint};

/// Raw first and second order sums over a component's pixels
#[derive(Debug, Default, Clone, Copy)]
struct MomentSums {
    n: f64,
    x: f64,
    y: f64,
    xx: f64,
    yy: f64,
    xy: f64,
}

impl MomentSums {
    fn add(&mut self, x: u32, y: u32) {
        let (x, y) = (x as f64, y as f64);
        self.n += 1.0;
        self.x += x;
        self.y += y;
        self.xx += x * x;
        self.yy += y * y;
        self.xy += x * y;
    }

    fn centroid(&self) -> PixelPoint {
        PixelPoint::new(self.x / self.n, self.y / self.n)
    }

    /// Central moments (mu20, mu02, mu11)
    fn central(&self) -> (f64, f64, f64) {
        let c = self.centroid();
        (
            self.xx - self.x * c.x,
            self.yy - self.y * c.y,
            self.xy - self.x * c.y,
        )
    }
}

/// Minor/major axis ratio of the ellipse with the given central moments
pub fn inertia_ratio(mu20: f64, mu02: f64, mu11: f64) -> f64 {
    let denominator = ((mu20 - mu02).powi(2) + 4.0 * mu11 * mu11).sqrt();
    if denominator <= 1e-9 {
        return 1.0;
    }
    let cos_min = (mu20 - mu02) / denominator;
    let sin_min = 2.0 * mu11 / denominator;
    let half_trace = 0.5 * (mu20 + mu02);
    let spread = 0.5 * (mu20 - mu02) * cos_min + mu11 * sin_min;
    let i_min = half_trace - spread;
    let i_max = half_trace + spread;
    if i_max <= 0.0 {
        return 1.0;
    }
    (i_min / i_max).clamp(0.0, 1.0)
}

/// Shoelace area of a closed polygon
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

/// Length of a closed polygon's boundary
pub fn closed_perimeter(points: &[Point<i32>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| ((a.x - b.x) as f64).hypot((a.y - b.y) as f64))
        .sum()
}

/// Circularity and convexity of an outer border
fn border_shape(border: &[Point<i32>]) -> (f64, f64) {
    let area = polygon_area(border);
    let perimeter = closed_perimeter(border);

    // A lone pixel has no extent to measure.
    if perimeter <= 0.0 {
        return (1.0, 1.0);
    }
    let circularity = 4.0 * PI * area / (perimeter * perimeter);

    let hull_area = polygon_area(&convex_hull(border.to_vec()));
    let convexity = if hull_area > 0.0 {
        (area / hull_area).min(1.0)
    } else {
        1.0
    };

    (circularity, convexity)
}

/// Label 8-connected foreground regions of a binary image and measure them
pub fn find_components(binary: &GrayImage) -> Vec<Component> {
    let labeled = connected_components(binary, Connectivity::Eight, Luma([0u8]));

    let mut sums: HashMap<u32, MomentSums> = HashMap::new();
    for (x, y, label) in labeled.enumerate_pixels() {
        let label_val = label[0];
        if label_val == 0 {
            continue; // Skip background
        }
        sums.entry(label_val).or_default().add(x, y);
    }

    if sums.is_empty() {
        return Vec::new();
    }

    // Suzuki border following tracks 8-connected regions too, so every outer
    // border lands inside exactly one label.
    let mut borders: HashMap<u32, Vec<Point<i32>>> = HashMap::new();
    for contour in find_contours::<i32>(binary) {
        if contour.border_type != BorderType::Outer {
            continue;
        }
        let Some(first) = contour.points.first() else {
            continue;
        };
        let label = labeled.get_pixel(first.x as u32, first.y as u32)[0];
        borders.entry(label).or_insert(contour.points);
    }

    let mut components: Vec<Component> = sums
        .into_iter()
        .map(|(label, s)| {
            let (mu20, mu02, mu11) = s.central();
            let (circularity, convexity) = borders
                .get(&label)
                .map(|b| border_shape(b))
                .unwrap_or((1.0, 1.0));
            Component {
                label,
                pixel_count: s.n as u32,
                centroid: s.centroid(),
                circularity,
                convexity,
                inertia_ratio: inertia_ratio(mu20, mu02, mu11),
            }
        })
        .collect();

    components.sort_by_key(|c| c.label);
    components
}

/// Components of the pixels strictly above `threshold`
pub fn components_at_level(mask: &GrayImage, threshold: u8) -> Vec<Component> {
    let level = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get_pixel(x, y)[0] > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    find_components(&level)
}

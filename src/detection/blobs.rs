//! Threshold-sweep blob extraction.
//!
//! Two passes, kept apart so each can be exercised on its own:
//!
//! 1. [`extract_levels`] binarizes the mask at every threshold level, labels
//!    8-connected components and drops those failing the shape filters.
//! 2. [`merge_levels`] chains components across adjacent levels by nearest
//!    centroid and keeps chains that are long enough to be stable.
//!
//! A chain that breaks and restarts at a later level becomes a second blob;
//! coinciding blobs from non-adjacent levels are not deduplicated.

use image::GrayImage;
use std::collections::HashMap;
use tracing::debug;

use crate::config::BlobParams;
use crate::detection::contours::components_at_level;
use crate::error::{DetectionError, Result};
use crate::models::{Blob, Component, PixelPoint};

/// Filtered components found at one threshold.
#[derive(Debug, Clone)]
pub struct ThresholdLevel {
    pub threshold: u8,
    pub components: Vec<Component>,
}

/// Shape filter gate for a single component
pub fn passes_filters(component: &Component, params: &BlobParams) -> bool {
    if params.filter_by_area {
        let area = component.area();
        if area < params.min_area || area > params.max_area {
            return false;
        }
    }
    if params.filter_by_circularity && component.circularity < params.min_circularity {
        return false;
    }
    if params.filter_by_convexity && component.convexity < params.min_convexity {
        return false;
    }
    if params.filter_by_inertia && component.inertia_ratio < params.min_inertia_ratio {
        return false;
    }
    true
}

/// Reject masks that are empty or not strictly two-level
pub fn validate_mask(mask: &GrayImage) -> Result<()> {
    if mask.width() == 0 || mask.height() == 0 {
        return Err(DetectionError::invalid_mask(format!(
            "mask has zero extent ({}x{})",
            mask.width(),
            mask.height()
        )));
    }
    if let Some(p) = mask.pixels().find(|p| p[0] != 0 && p[0] != 255) {
        return Err(DetectionError::invalid_mask(format!(
            "mask is not binary (found value {})",
            p[0]
        )));
    }
    Ok(())
}

/// First pass: level -> filtered components, in increasing threshold order
pub fn extract_levels(mask: &GrayImage, params: &BlobParams) -> Vec<ThresholdLevel> {
    params
        .threshold_levels()
        .into_iter()
        .map(|threshold| {
            let all = components_at_level(mask, threshold);
            let total = all.len();
            let components: Vec<Component> =
                all.into_iter().filter(|c| passes_filters(c, params)).collect();
            debug!(threshold, total, kept = components.len(), "Threshold level");
            ThresholdLevel {
                threshold,
                components,
            }
        })
        .collect()
}

/// Components chained across consecutive levels
#[derive(Debug, Clone)]
struct BlobGroup {
    members: Vec<Component>,
    last_level: usize,
}

impl BlobGroup {
    fn last(&self) -> &Component {
        // Groups are created with one member and only grow.
        &self.members[self.members.len() - 1]
    }

    fn to_blob(&self) -> Blob {
        let n = self.members.len() as f64;
        let (sx, sy, sd, sr) = self.members.iter().fold((0.0, 0.0, 0.0, 0.0), |acc, c| {
            (
                acc.0 + c.centroid.x,
                acc.1 + c.centroid.y,
                acc.2 + c.equivalent_diameter(),
                acc.3 + c.inertia_ratio,
            )
        });
        Blob {
            centroid: PixelPoint::new(sx / n, sy / n),
            size: sd / n,
            response: sr / n,
            repeatability: self.members.len(),
        }
    }
}

/// Uniform grid over centroids for neighbour lookups
#[derive(Debug)]
pub struct CentroidGrid {
    cell: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl CentroidGrid {
    pub fn new(cell: f64) -> Self {
        Self {
            cell: cell.max(1.0),
            cells: HashMap::new(),
        }
    }

    fn key(&self, p: PixelPoint) -> (i64, i64) {
        ((p.x / self.cell).floor() as i64, (p.y / self.cell).floor() as i64)
    }

    pub fn insert(&mut self, p: PixelPoint, id: usize) {
        let key = self.key(p);
        self.cells.entry(key).or_default().push(id);
    }

    /// Ids stored in cells overlapping the square of half-width `radius` around `p`
    pub fn candidates(&self, p: PixelPoint, radius: f64) -> Vec<usize> {
        let (cx, cy) = self.key(p);
        let reach = (radius / self.cell).ceil() as i64;
        let mut out = Vec::new();
        for gy in cy - reach..=cy + reach {
            for gx in cx - reach..=cx + reach {
                if let Some(ids) = self.cells.get(&(gx, gy)) {
                    out.extend_from_slice(ids);
                }
            }
        }
        out
    }
}

/// Second pass: chain components across adjacent levels and emit stable blobs
pub fn merge_levels(levels: &[ThresholdLevel], params: &BlobParams) -> Vec<Blob> {
    let mut groups: Vec<BlobGroup> = Vec::new();
    // Groups extended at the previous level, the only ones a component may join.
    let mut active: Vec<usize> = Vec::new();

    for (level_idx, level) in levels.iter().enumerate() {
        let mut grid = CentroidGrid::new(params.min_dist_between_blobs);
        let mut max_active_radius: f64 = 0.0;
        for &g in &active {
            let last = groups[g].last();
            grid.insert(last.centroid, g);
            max_active_radius = max_active_radius.max(last.radius());
        }

        let mut next_active = Vec::with_capacity(level.components.len());
        for component in &level.components {
            let reach = params
                .min_dist_between_blobs
                .max(component.radius())
                .max(max_active_radius);

            let best = grid
                .candidates(component.centroid, reach)
                .into_iter()
                .filter(|&g| groups[g].last_level + 1 == level_idx)
                .filter_map(|g| {
                    let last = groups[g].last();
                    let dist = last.centroid.distance(&component.centroid);
                    let tolerance = params
                        .min_dist_between_blobs
                        .max(last.radius())
                        .max(component.radius());
                    (dist < tolerance).then_some((g, dist))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

            match best {
                Some((g, _)) => {
                    groups[g].members.push(component.clone());
                    groups[g].last_level = level_idx;
                    next_active.push(g);
                }
                None => {
                    groups.push(BlobGroup {
                        members: vec![component.clone()],
                        last_level: level_idx,
                    });
                    next_active.push(groups.len() - 1);
                }
            }
        }
        active = next_active;
    }

    groups
        .iter()
        .filter(|g| g.members.len() >= params.min_repeatability)
        .map(BlobGroup::to_blob)
        .collect()
}

/// Multi-threshold blob detector over a binary mask
#[derive(Debug, Clone, Default)]
pub struct BlobExtractor {
    params: BlobParams,
}

impl BlobExtractor {
    pub fn new(params: BlobParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &BlobParams {
        &self.params
    }

    pub fn detect(&self, mask: &GrayImage) -> Result<Vec<Blob>> {
        validate_mask(mask)?;
        let levels = extract_levels(mask, &self.params);
        let blobs = merge_levels(&levels, &self.params);
        debug!(levels = levels.len(), blobs = blobs.len(), "Blob extraction done");
        Ok(blobs)
    }
}

/// One-shot form of [`BlobExtractor::detect`]
pub fn detect_blobs(mask: &GrayImage, params: &BlobParams) -> Result<Vec<Blob>> {
    BlobExtractor::new(params.clone())?.detect(mask)
}

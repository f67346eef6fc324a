use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{DetectionError, Result};

/// Brightness/contrast calibration and binarization settings.
///
/// Defaults are tuned for the dynamic range of summer RGB orthophotos where
/// crowns are darker than the surrounding ground.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Brightness shift in `[-255, 255]`; 0 disables the stage.
    pub brightness: i32,
    /// Contrast gain in `[-127, 130]`; 0 disables the stage.
    pub contrast: i32,
    /// Pixels at or above this intensity become foreground.
    pub binary_threshold: u8,
    /// Radius of the square structuring element used for opening (1 = 3x3).
    pub opening_radius: u8,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            brightness: 64,
            contrast: 90,
            binary_threshold: 170,
            opening_radius: 1,
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<()> {
        if !(-255..=255).contains(&self.brightness) {
            return Err(DetectionError::invalid_config(format!(
                "brightness {} outside [-255, 255]",
                self.brightness
            )));
        }
        // The gain formula has a pole at 131.
        if !(-127..=130).contains(&self.contrast) {
            return Err(DetectionError::invalid_config(format!(
                "contrast {} outside [-127, 130]",
                self.contrast
            )));
        }
        Ok(())
    }
}

/// Threshold sweep, merge and shape filter settings for blob extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobParams {
    /// First threshold level (inclusive).
    pub min_threshold: u8,
    /// Sweep stops before this level.
    pub max_threshold: u8,
    pub threshold_step: u8,
    /// Minimum number of adjacent levels a blob must appear in.
    pub min_repeatability: usize,
    /// Floor of the centroid distance tolerance used when merging levels.
    pub min_dist_between_blobs: f64,

    pub filter_by_area: bool,
    pub min_area: u32,
    pub max_area: u32,

    pub filter_by_circularity: bool,
    pub min_circularity: f64,

    pub filter_by_convexity: bool,
    pub min_convexity: f64,

    pub filter_by_inertia: bool,
    pub min_inertia_ratio: f64,
}

impl Default for BlobParams {
    fn default() -> Self {
        Self {
            min_threshold: 0,
            max_threshold: 100,
            threshold_step: 10,
            min_repeatability: 2,
            min_dist_between_blobs: 10.0,
            filter_by_area: true,
            min_area: 1,
            max_area: 10,
            filter_by_circularity: true,
            min_circularity: 0.0,
            filter_by_convexity: true,
            min_convexity: 0.0,
            filter_by_inertia: true,
            min_inertia_ratio: 0.01,
        }
    }
}

impl BlobParams {
    /// Threshold levels visited by the sweep, in increasing order.
    pub fn threshold_levels(&self) -> Vec<u8> {
        if self.threshold_step == 0 {
            return Vec::new();
        }
        (self.min_threshold..self.max_threshold)
            .step_by(self.threshold_step as usize)
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.threshold_step == 0 {
            return Err(DetectionError::invalid_config("threshold_step must be positive"));
        }
        if self.min_threshold >= self.max_threshold {
            return Err(DetectionError::invalid_config(format!(
                "min_threshold {} must be below max_threshold {}",
                self.min_threshold, self.max_threshold
            )));
        }
        if self.min_area > self.max_area {
            return Err(DetectionError::invalid_config(format!(
                "min_area {} exceeds max_area {}",
                self.min_area, self.max_area
            )));
        }
        let levels = self.threshold_levels().len();
        if self.min_repeatability == 0 || self.min_repeatability > levels {
            return Err(DetectionError::invalid_config(format!(
                "min_repeatability {} must be in [1, {}]",
                self.min_repeatability, levels
            )));
        }
        if self.min_dist_between_blobs.is_nan() || self.min_dist_between_blobs < 0.0 {
            return Err(DetectionError::invalid_config(
                "min_dist_between_blobs must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Complete tree counter configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    pub preprocess: PreprocessConfig,
    pub blobs: BlobParams,
}

impl CounterConfig {
    /// Load a JSON configuration file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.preprocess.validate()?;
        self.blobs.validate()
    }
}

pub mod blobs;
pub mod contours;
pub mod preprocessing;
pub mod steps;

use image::{DynamicImage, GrayImage, RgbImage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::config::{BlobParams, CounterConfig, PreprocessConfig};
use crate::error::Result;
use crate::models::DetectionResult;
use crate::pipeline::Pipeline;
use crate::tiles::Tile;
use blobs::BlobExtractor;

/// Build the preprocessing steps that run after forest masking
pub fn build_preprocessing_pipeline(config: &PreprocessConfig) -> Pipeline {
    use crate::detection::steps::*;

    Pipeline::new()
        .add_step(Arc::new(InvertStep))
        .add_step(Arc::new(GrayscaleStep))
        .add_step(Arc::new(BrightnessContrastStep {
            brightness: config.brightness,
            contrast: config.contrast,
        }))
        .add_step(Arc::new(BinarizeStep {
            threshold: config.binary_threshold,
        }))
        .add_step(Arc::new(OpeningStep {
            radius: config.opening_radius,
        }))
}

/// Turns an RGB tile and its forest mask into a binary crown mask
#[derive(Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
    pipeline: Pipeline,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        config.validate()?;
        let pipeline = build_preprocessing_pipeline(&config);
        Ok(Self { config, pipeline })
    }

    /// Dump every intermediate image under `output_dir` for tagged calls
    pub fn with_debug(mut self, output_dir: PathBuf) -> anyhow::Result<Self> {
        self.pipeline = self.pipeline.with_debug(output_dir)?;
        Ok(self)
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    pub fn normalize(&self, rgb: &RgbImage, forest_mask: &GrayImage) -> Result<GrayImage> {
        self.normalize_tagged(rgb, forest_mask, None)
    }

    pub fn normalize_tagged(
        &self,
        rgb: &RgbImage,
        forest_mask: &GrayImage,
        tag: Option<&str>,
    ) -> Result<GrayImage> {
        preprocessing::check_shape(rgb, forest_mask)?;
        let masked = preprocessing::apply_forest_mask(rgb, forest_mask);
        let out = self.pipeline.run(DynamicImage::ImageRgb8(masked), tag)?;
        Ok(out.to_luma8())
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        let config = PreprocessConfig::default();
        let pipeline = build_preprocessing_pipeline(&config);
        Self { config, pipeline }
    }
}

/// Per-tile crown detector: masking, preprocessing and blob extraction
#[derive(Clone, Default)]
pub struct TreeCounter {
    preprocessor: Preprocessor,
    extractor: BlobExtractor,
}

impl TreeCounter {
    pub fn new(config: CounterConfig) -> Result<Self> {
        Ok(Self {
            preprocessor: Preprocessor::new(config.preprocess)?,
            extractor: BlobExtractor::new(config.blobs)?,
        })
    }

    pub fn with_debug(mut self, output_dir: PathBuf) -> anyhow::Result<Self> {
        self.preprocessor = self.preprocessor.with_debug(output_dir)?;
        Ok(self)
    }

    pub fn blob_params(&self) -> &BlobParams {
        self.extractor.params()
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// Detect crowns in one tile
    pub fn count(&self, rgb: &RgbImage, forest_mask: &GrayImage) -> Result<DetectionResult> {
        self.count_tagged(rgb, forest_mask, None)
    }

    /// Detect crowns in a tile from a tile source, tagging debug dumps with its index
    pub fn count_tile(&self, tile: &Tile) -> Result<DetectionResult> {
        let tag = format!("tile_{:05}", tile.index);
        self.count_tagged(&tile.rgb, &tile.forest_mask, Some(&tag))
    }

    fn count_tagged(
        &self,
        rgb: &RgbImage,
        forest_mask: &GrayImage,
        tag: Option<&str>,
    ) -> Result<DetectionResult> {
        preprocessing::check_shape(rgb, forest_mask)?;

        if !preprocessing::has_forest(forest_mask) {
            debug!("No forest pixels in tile, skipping");
            return Ok(DetectionResult::empty());
        }

        let binary = self.preprocessor.normalize_tagged(rgb, forest_mask, tag)?;
        let blobs = self.extractor.detect(&binary)?;
        debug!(count = blobs.len(), "Tile counted");
        Ok(DetectionResult::new(blobs))
    }
}

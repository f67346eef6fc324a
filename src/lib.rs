//! Classical tree crown detection for aerial orthophoto tiles.
//!
//! A tile is masked to its forest pixels, normalized and binarized by the
//! [`Preprocessor`], scanned by the multi-threshold [`BlobExtractor`], and
//! each surviving blob centroid is mapped to the raster's CRS with the
//! [`CoordinateMapper`].

pub mod config;
pub mod coordinates;
pub mod detection;
pub mod error;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod tiles;

pub use config::{BlobParams, CounterConfig, PreprocessConfig};
pub use coordinates::{AffineTransform, CoordinateMapper, to_geographic};
pub use detection::blobs::{BlobExtractor, detect_blobs};
pub use detection::{Preprocessor, TreeCounter};
pub use error::{DetectionError, Result};
pub use models::{Blob, Component, DetectionResult, GeoPoint, PixelPoint, RasterIndex};
pub use output::{GeoJsonWriter, VectorWriter};
pub use pipeline::{Pipeline, PipelineStep};
pub use tiles::{RasterTiles, Tile, TileSource};

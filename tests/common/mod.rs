mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from crowncount for tests
pub use crowncount::{
    AffineTransform, BlobParams, CounterConfig, DetectionError, GeoPoint, PixelPoint, Preprocessor,
    RasterIndex, TreeCounter,
};

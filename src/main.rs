use anyhow::Context;
use clap::Parser;
use image::ImageReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crowncount::output::{crown_feature_id, crown_ids_overflow, draw_keypoints, tile_feature_id};
use crowncount::{
    AffineTransform, CoordinateMapper, CounterConfig, GeoJsonWriter, RasterTiles, TreeCounter,
    VectorWriter,
};

#[derive(Parser)]
#[command(name = "crowncount")]
#[command(about = "Detect tree crowns in an aerial orthophoto and export them as GeoJSON")]
struct Cli {
    /// Path to the RGB orthophoto
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// World file with the raster's affine transform (defaults to a sibling .wld/.tfw/.pgw/.jgw)
    #[arg(long, value_name = "FILE")]
    world_file: Option<PathBuf>,

    /// Grayscale raster marking forest pixels (non-zero); defaults to all forest
    #[arg(long, value_name = "IMAGE")]
    forest_mask: Option<PathBuf>,

    /// Tile edge length in pixels
    #[arg(long, default_value_t = 256)]
    tile_size: u32,

    /// Output directory for GeoJSON and keypoint images
    #[arg(long, value_name = "DIR", default_value = "outputs")]
    out: PathBuf,

    /// JSON file overriding detector parameters
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Save a keypoint overlay PNG per tile
    #[arg(long)]
    keypoints: bool,

    /// Save preprocessing steps per tile to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Explicit world file, else the first sibling sidecar that exists
fn load_transform(image_path: &Path, world_file: Option<&Path>) -> anyhow::Result<AffineTransform> {
    if let Some(path) = world_file {
        return AffineTransform::from_world_file(path)
            .with_context(|| format!("Failed to read world file {}", path.display()));
    }

    for ext in ["wld", "tfw", "pgw", "jgw"] {
        let candidate = image_path.with_extension(ext);
        if candidate.exists() {
            info!(path = %candidate.display(), "Using world file");
            return Ok(AffineTransform::from_world_file(&candidate)?);
        }
    }

    warn!("No world file found, writing pixel coordinates");
    Ok(AffineTransform::identity())
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => CounterConfig::from_json_file(path)?,
        None => CounterConfig::default(),
    };

    info!(path = %args.image_path.display(), "Loading image");
    let rgb = ImageReader::open(&args.image_path)?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?
        .to_rgb8();
    info!(width = rgb.width(), height = rgb.height(), "Image loaded");

    let forest_mask = match &args.forest_mask {
        Some(path) => Some(
            ImageReader::open(path)?
                .decode()
                .map_err(|e| anyhow::anyhow!("Failed to decode forest mask: {}", e))?
                .to_luma8(),
        ),
        None => None,
    };

    let transform = load_transform(&args.image_path, args.world_file.as_deref())?;
    let mapper = CoordinateMapper::new(transform);

    let mut counter = TreeCounter::new(config)?;
    if let Some(debug_dir) = args.debug_out {
        counter = counter.with_debug(debug_dir)?;
    }

    std::fs::create_dir_all(&args.out)?;
    let keypoints_dir = args.out.join("keypoints_png");
    if args.keypoints {
        std::fs::create_dir_all(&keypoints_dir)?;
    }

    let tiles = RasterTiles::new(rgb, forest_mask, transform, args.tile_size)?;
    info!(tiles = tiles.tile_count(), tile_size = args.tile_size, "Counting trees");

    let mut trees = GeoJsonWriter::new();
    let mut rectangles = GeoJsonWriter::new();
    let mut processed = 0usize;
    let mut skipped = 0usize;
    let mut total = 0usize;

    for tile in tiles {
        let tile = tile?;
        let result = match counter.count_tile(&tile) {
            Ok(result) => result,
            Err(e) => {
                warn!(tile = tile.index, error = %e, "Skipping tile");
                skipped += 1;
                continue;
            }
        };

        rectangles.write_polygon(tile_feature_id(tile.index), &tile.bounding_ring())?;

        if crown_ids_overflow(result.count()) {
            warn!(
                tile = tile.index,
                crowns = result.count(),
                "Crown ids overflow into the next tile's id block"
            );
        }

        for (nr, blob) in result.blobs().iter().enumerate() {
            let point = mapper.to_geographic(tile.upper_left, blob.centroid);
            trees.write_point(crown_feature_id(tile.index, nr), point)?;
        }

        if args.keypoints {
            let overlay = draw_keypoints(&tile.rgb, result.blobs());
            let path = keypoints_dir.join(format!("{}.png", tile_feature_id(tile.index)));
            overlay
                .save(&path)
                .with_context(|| format!("Failed to save keypoints {}", path.display()))?;
        }

        processed += 1;
        total += result.count();
    }

    trees.save(&args.out.join("trees.geojson"))?;
    rectangles.save(&args.out.join("rectangles.geojson"))?;

    println!("\n=== Tree Crown Detection Results ===");
    println!("Tiles processed: {}", processed);
    if skipped > 0 {
        println!("Tiles skipped: {}", skipped);
    }
    println!("Total crowns detected: {}", total);
    println!("Output written to {}", args.out.display());

    Ok(())
}

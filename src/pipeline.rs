use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;

/// One image-to-image stage of the preprocessing pipeline.
pub trait PipelineStep: Send + Sync {
    fn process(&self, image: DynamicImage) -> Result<DynamicImage>;

    /// Human-readable name for this step (used in logs and debug dumps)
    fn name(&self) -> &str;
}

/// Ordered list of image steps.
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    /// Root directory for debug dumps, if enabled
    debug_dir: Option<PathBuf>,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable debug mode with output directory.
    /// The directory must be empty or non-existent.
    pub fn with_debug(mut self, output_dir: PathBuf) -> anyhow::Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.debug_dir = Some(output_dir);
        Ok(self)
    }

    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step in order.
    ///
    /// When debug mode is on and `tag` is given, the input and each step's
    /// output are written under `<output_dir>/<tag>/`.
    pub fn run(&self, input: DynamicImage, tag: Option<&str>) -> Result<DynamicImage> {
        let dump_dir = match (&self.debug_dir, tag) {
            (Some(root), Some(tag)) => {
                let dir = root.join(tag);
                std::fs::create_dir_all(&dir)?;
                input.save(dir.join("00_input.png"))?;
                Some(dir)
            }
            _ => None,
        };

        let mut image = input;
        for (step_idx, step) in self.steps.iter().enumerate() {
            let step_name = step.name();
            image = step.process(image)?;
            debug!(step = step_name, width = image.width(), height = image.height(), "Step done");

            if let Some(dir) = &dump_dir {
                let filename = format!(
                    "{:02}_{}.png",
                    step_idx + 1,
                    step_name.to_lowercase().replace(' ', "_")
                );
                image.save(dir.join(&filename))?;
            }
        }

        Ok(image)
    }
}

use crate::detection::preprocessing;
use crate::error::Result;
use crate::pipeline::PipelineStep;
use image::DynamicImage;

/// Complement pixel intensities so dark crowns turn bright
pub struct InvertStep;

impl PipelineStep for InvertStep {
    fn process(&self, image: DynamicImage) -> Result<DynamicImage> {
        Ok(preprocessing::invert(&image))
    }

    fn name(&self) -> &str {
        "Invert"
    }
}

/// Convert image to grayscale
pub struct GrayscaleStep;

impl PipelineStep for GrayscaleStep {
    fn process(&self, image: DynamicImage) -> Result<DynamicImage> {
        Ok(DynamicImage::ImageLuma8(preprocessing::to_grayscale(&image)))
    }

    fn name(&self) -> &str {
        "Grayscale Conversion"
    }
}

/// Brightness shift followed by contrast gain
pub struct BrightnessContrastStep {
    pub brightness: i32,
    pub contrast: i32,
}

impl PipelineStep for BrightnessContrastStep {
    fn process(&self, image: DynamicImage) -> Result<DynamicImage> {
        let gray = image.to_luma8();
        let adjusted =
            preprocessing::adjust_brightness_contrast(&gray, self.brightness, self.contrast);
        Ok(DynamicImage::ImageLuma8(adjusted))
    }

    fn name(&self) -> &str {
        "Brightness Contrast"
    }
}

/// Global fixed threshold
pub struct BinarizeStep {
    pub threshold: u8,
}

impl PipelineStep for BinarizeStep {
    fn process(&self, image: DynamicImage) -> Result<DynamicImage> {
        let gray = image.to_luma8();
        Ok(DynamicImage::ImageLuma8(preprocessing::binarize(&gray, self.threshold)))
    }

    fn name(&self) -> &str {
        "Binarize"
    }
}

/// Morphological opening to drop speckle noise
pub struct OpeningStep {
    pub radius: u8,
}

impl PipelineStep for OpeningStep {
    fn process(&self, image: DynamicImage) -> Result<DynamicImage> {
        let gray = image.to_luma8();
        Ok(DynamicImage::ImageLuma8(preprocessing::open_mask(&gray, self.radius)))
    }

    fn name(&self) -> &str {
        "Opening"
    }
}

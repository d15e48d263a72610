use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, Luma};
use imageproc::contrast::{ThresholdType, threshold};
use imageproc::filter::gaussian_blur_f32;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::store::save_image_atomic;

/// Canvas fill outside the pasted content. White, like the paper.
pub const BACKGROUND: u8 = 255;

/// A source image resized, denoised, binarized and centered on a square canvas.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    image: GrayImage,
    offset: (u32, u32),
    content_size: (u32, u32),
    scale: f32,
}

impl NormalizedImage {
    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }

    pub fn canvas_size(&self) -> u32 {
        self.image.width()
    }

    /// Top-left corner of the pasted content on the canvas.
    pub fn offset(&self) -> (u32, u32) {
        self.offset
    }

    /// Size of the resized source inside the canvas.
    pub fn content_size(&self) -> (u32, u32) {
        self.content_size
    }

    /// Factor applied to the source dimensions.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Write the canvas as PNG.
    pub fn save(&self, path: &Path) -> Result<()> {
        save_image_atomic(path, &DynamicImage::ImageLuma8(self.image.clone()), ImageFormat::Png)
    }
}

/// Turns arbitrary floor plan scans into the canonical detector frame.
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    pub canvas_size: u32,
    pub blur_sigma: f32,
    pub binary_threshold: u8,
}

impl ImageNormalizer {
    pub fn new() -> Self {
        Self::from_config(&PipelineConfig::default())
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            canvas_size: config.canvas_size,
            blur_sigma: config.blur_sigma,
            binary_threshold: config.binary_threshold,
        }
    }

    /// Decode an image file from disk.
    pub fn load(path: &Path) -> Result<DynamicImage> {
        ImageReader::open(path)
            .map_err(|e| Error::InvalidImage(format!("{}: {}", path.display(), e)))?
            .with_guessed_format()
            .map_err(|e| Error::InvalidImage(format!("{}: {}", path.display(), e)))?
            .decode()
            .map_err(|e| Error::InvalidImage(format!("Failed to decode {}: {}", path.display(), e)))
    }

    pub fn normalize(&self, img: &DynamicImage) -> Result<NormalizedImage> {
        self.normalize_traced(img, |_, _| {})
    }

    pub fn normalize_file(&self, path: &Path) -> Result<NormalizedImage> {
        self.normalize(&Self::load(path)?)
    }

    /// Same as [`normalize`](Self::normalize), handing every intermediate raster
    /// to `trace` along with a stage name.
    pub fn normalize_traced(
        &self,
        img: &DynamicImage,
        mut trace: impl FnMut(&str, &GrayImage),
    ) -> Result<NormalizedImage> {
        let (width, height) = (img.width(), img.height());
        if width == 0 || height == 0 {
            return Err(Error::InvalidImage(format!(
                "Image has a zero dimension ({}x{})",
                width, height
            )));
        }

        let gray = img.to_luma8();
        trace("01_grayscale", &gray);

        let (new_width, new_height) = fit_long_edge(width, height, self.canvas_size);
        let resized = imageops::resize(&gray, new_width, new_height, FilterType::Triangle);
        trace("02_resized", &resized);

        let blurred = gaussian_blur_f32(&resized, self.blur_sigma);
        trace("03_blurred", &blurred);

        // Dark ink drops to 0, paper goes to 255
        let mask = threshold(&blurred, self.binary_threshold, ThresholdType::Binary);
        trace("04_binary", &mask);

        let mut canvas = GrayImage::from_pixel(self.canvas_size, self.canvas_size, Luma([BACKGROUND]));
        let offset_x = (self.canvas_size - new_width) / 2;
        let offset_y = (self.canvas_size - new_height) / 2;
        imageops::replace(&mut canvas, &mask, offset_x.into(), offset_y.into());
        trace("05_canvas", &canvas);

        Ok(NormalizedImage {
            image: canvas,
            offset: (offset_x, offset_y),
            content_size: (new_width, new_height),
            scale: new_width as f32 / width as f32,
        })
    }
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale so the longer side becomes `target`, keeping the aspect ratio.
/// Neither side collapses below one pixel.
pub fn fit_long_edge(width: u32, height: u32, target: u32) -> (u32, u32) {
    if width >= height {
        let h = (target as f64 * height as f64 / width as f64).round() as u32;
        (target, h.clamp(1, target))
    } else {
        let w = (target as f64 * width as f64 / height as f64).round() as u32;
        (w.clamp(1, target), target)
    }
}

use image::DynamicImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::detector::Detector;
use crate::error::{Error, Result};
use crate::models::{BoundingBox, Detection, ElementClass, InstanceMask};

/// Number of rectangular holes punched into every synthetic mask
const PERFORATIONS: usize = 10;

/// Generates plausible random floor plan detections without any model.
///
/// Every call yields 3-8 walls, 2-6 windows and 1-4 doors, in that order.
pub struct SyntheticDetector {
    rng: StdRng,
}

impl SyntheticDetector {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence of detections.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn random_box(&mut self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let x1 = self.rng.gen_range(0..=width.saturating_sub(100));
        let y1 = self.rng.gen_range(0..=height.saturating_sub(100));
        let x2 = (x1 + self.rng.gen_range(50..=200)).min(width);
        let y2 = (y1 + self.rng.gen_range(50..=200)).min(height);
        (x1, y1, x2, y2)
    }

    fn random_mask(&mut self, width: u32, height: u32, rect: (u32, u32, u32, u32)) -> InstanceMask {
        let (x1, y1, x2, y2) = rect;
        let mut mask = InstanceMask::new(width, height);
        mask.fill_rect(x1, y1, x2, y2, true);

        // Boxes too small to hold a hole stay solid
        if x2 - x1 < 15 || y2 - y1 < 15 {
            return mask;
        }
        for _ in 0..PERFORATIONS {
            let rx1 = self.rng.gen_range(x1..=x2 - 10);
            let ry1 = self.rng.gen_range(y1..=y2 - 10);
            let rx2 = self.rng.gen_range(rx1 + 5..=x2);
            let ry2 = self.rng.gen_range(ry1 + 5..=y2);
            mask.fill_rect(rx1, ry1, rx2, ry2, false);
        }
        mask
    }
}

impl Default for SyntheticDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for SyntheticDetector {
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(Error::Inference(format!(
                "Cannot detect on a {}x{} image",
                width, height
            )));
        }

        let counts = [
            (ElementClass::Wall, self.rng.gen_range(3..=8)),
            (ElementClass::Window, self.rng.gen_range(2..=6)),
            (ElementClass::Door, self.rng.gen_range(1..=4)),
        ];

        let mut detections = Vec::new();
        for (class, count) in counts {
            for _ in 0..count {
                let score = self.rng.gen_range(0.70f32..0.98);
                let rect = self.random_box(width, height);
                let mask = self.random_mask(width, height, rect);
                let (x1, y1, x2, y2) = rect;
                detections.push(Detection {
                    class,
                    score,
                    bbox: BoundingBox::new(x1 as f32, y1 as f32, x2 as f32, y2 as f32),
                    mask,
                });
            }
        }

        debug!("Synthetic detector produced {} detections", detections.len());
        Ok(detections)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

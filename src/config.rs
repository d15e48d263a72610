//! Pipeline configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detector::{Detector, DetectorFactory, MaskRcnnDetector, SyntheticDetector};
use crate::error::{Error, Result};

/// Which detector backend to build on first use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectorConfig {
    /// Randomized stand-in that needs no weights. A seed makes it reproducible.
    Synthetic {
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Trained Mask R-CNN exported to `.rten`.
    MaskRcnn { weights: PathBuf },
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig::Synthetic { seed: None }
    }
}

impl DetectorConfig {
    /// Factory that builds the configured backend. Nothing is loaded until it is called.
    pub fn factory(&self, min_confidence: f32) -> DetectorFactory {
        match self.clone() {
            DetectorConfig::Synthetic { seed } => DetectorFactory::new(move || {
                let detector = match seed {
                    Some(seed) => SyntheticDetector::with_seed(seed),
                    None => SyntheticDetector::new(),
                };
                Ok(Box::new(detector) as Box<dyn Detector>)
            }),
            DetectorConfig::MaskRcnn { weights } => DetectorFactory::new(move || {
                let detector = MaskRcnnDetector::load(&weights)?.with_min_confidence(min_confidence);
                Ok(Box::new(detector) as Box<dyn Detector>)
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Side of the square canvas every image is normalized onto
    pub canvas_size: u32,
    /// Sigma of the denoising blur (1.1 matches a 5x5 Gaussian kernel)
    pub blur_sigma: f32,
    /// Pixels brighter than this become background
    pub binary_threshold: u8,
    /// Detections scoring below this are discarded by the real backend
    pub min_confidence: f32,
    /// Prefix for the `image_url` stored with each result
    pub image_url_prefix: String,
    pub detector: DetectorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            canvas_size: 1024,
            blur_sigma: 1.1,
            binary_threshold: 70,
            min_confidence: 0.5,
            image_url_prefix: "/api/floorplan/images".to_string(),
            detector: DetectorConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::storage(path, e))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.canvas_size == 0 {
            return Err(Error::Config("canvas_size must be non-zero".to_string()));
        }
        if self.blur_sigma.is_nan() || self.blur_sigma <= 0.0 {
            return Err(Error::Config("blur_sigma must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::Config("min_confidence must be within [0, 1]".to_string()));
        }
        if let DetectorConfig::MaskRcnn { weights } = &self.detector {
            if weights.as_os_str().is_empty() {
                return Err(Error::Config("weights path must not be empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn detector_factory(&self) -> DetectorFactory {
        self.detector.factory(self.min_confidence)
    }
}

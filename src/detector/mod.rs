//! Detector backends and the shared handle the pipeline reaches them through.

mod handle;
mod mask_rcnn;
mod synthetic;

use std::fmt;
use std::sync::Arc;

use image::DynamicImage;

use crate::error::Result;
use crate::models::Detection;

pub use handle::DetectorHandle;
pub use mask_rcnn::MaskRcnnDetector;
pub use synthetic::SyntheticDetector;

/// Common interface for instance segmentation backends.
///
/// Every returned detection has a mask the size of `image`, a box inside the
/// image bounds and a non-background class.
pub trait Detector: Send {
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Detection>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

type BuildFn = dyn Fn() -> Result<Box<dyn Detector>> + Send + Sync;

/// Deferred constructor for a detector backend.
#[derive(Clone)]
pub struct DetectorFactory {
    build: Arc<BuildFn>,
}

impl DetectorFactory {
    pub fn new<F>(build: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Detector>> + Send + Sync + 'static,
    {
        Self {
            build: Arc::new(build),
        }
    }

    pub fn build(&self) -> Result<Box<dyn Detector>> {
        (self.build)()
    }
}

impl fmt::Debug for DetectorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorFactory").finish_non_exhaustive()
    }
}

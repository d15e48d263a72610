use std::sync::{Arc, Mutex, PoisonError};

use image::DynamicImage;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::detector::{Detector, DetectorFactory};
use crate::error::{Error, Result};
use crate::models::Detection;

type SharedDetector = Arc<Mutex<Box<dyn Detector>>>;

/// Lazily constructed detector shared by every request.
///
/// The first caller builds the backend while concurrent callers wait on the
/// same initialization. A failed build leaves the handle empty so the next
/// request tries again. Detection calls are serialized behind one lock.
pub struct DetectorHandle {
    factory: DetectorFactory,
    detector: OnceCell<SharedDetector>,
}

impl DetectorHandle {
    pub fn new(factory: DetectorFactory) -> Self {
        Self {
            factory,
            detector: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.detector.initialized()
    }

    async fn shared(&self) -> Result<SharedDetector> {
        let detector = self
            .detector
            .get_or_try_init(|| async {
                let factory = self.factory.clone();
                let built = tokio::task::spawn_blocking(move || factory.build())
                    .await
                    .map_err(|e| Error::DetectorUnavailable(e.to_string()))?;

                match built {
                    Ok(detector) => {
                        info!("Detector '{}' initialized", detector.name());
                        Ok(Arc::new(Mutex::new(detector)))
                    }
                    Err(e) => {
                        warn!("Detector initialization failed: {}", e);
                        Err(Error::DetectorUnavailable(e.to_string()))
                    }
                }
            })
            .await?;
        Ok(detector.clone())
    }

    /// Build the backend now instead of on the first request.
    pub async fn warm_up(&self) -> Result<()> {
        self.shared().await.map(|_| ())
    }

    pub async fn detect(&self, image: Arc<DynamicImage>) -> Result<Vec<Detection>> {
        let detector = self.shared().await?;

        tokio::task::spawn_blocking(move || {
            // A backend that panicked mid-call keeps serving later requests
            let mut guard = detector.lock().unwrap_or_else(PoisonError::into_inner);
            guard.detect(&image)
        })
        .await
        .map_err(|e| Error::Worker(e.to_string()))?
    }
}

impl std::fmt::Debug for DetectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorHandle")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

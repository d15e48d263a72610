use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GrayImage, ImageFormat};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::detection::{GeometryExtractor, ImageNormalizer, NormalizedImage};
use crate::detector::DetectorHandle;
use crate::error::{Error, Result, Stage};
use crate::models::{Detection, DetectionResult, ElementClass};
use crate::render;
use crate::store::{FsResultStore, ResultRepository, save_image_atomic, staging_path};

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

impl DebugConfig {
    fn request_dir(&self, id: Uuid) -> PathBuf {
        self.output_dir.join(id.to_string())
    }
}

/// Runs normalize -> detect -> extract -> render -> persist for each request.
///
/// A request either produces a stored [`DetectionResult`] or fails as a whole;
/// artifacts written before a failure are removed again.
pub struct DetectionOrchestrator<R: ResultRepository = FsResultStore> {
    config: PipelineConfig,
    normalizer: ImageNormalizer,
    extractor: GeometryExtractor,
    detector: Arc<DetectorHandle>,
    store: R,
    debug: Option<DebugConfig>,
}

impl DetectionOrchestrator<FsResultStore> {
    /// Orchestrator over a filesystem store at `data_dir`, with a detector
    /// built from the configuration on first use.
    pub async fn open<P: AsRef<Path>>(config: PipelineConfig, data_dir: P) -> Result<Self> {
        config.validate()?;
        let store = FsResultStore::open(data_dir, config.image_url_prefix.clone()).await?;
        let detector = Arc::new(DetectorHandle::new(config.detector_factory()));
        Ok(Self::new(config, detector, store))
    }
}

impl<R: ResultRepository> DetectionOrchestrator<R> {
    pub fn new(config: PipelineConfig, detector: Arc<DetectorHandle>, store: R) -> Self {
        Self {
            normalizer: ImageNormalizer::from_config(&config),
            extractor: GeometryExtractor::new(),
            config,
            detector,
            store,
            debug: None,
        }
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let mut entries = std::fs::read_dir(&output_dir).map_err(|e| Error::storage(&output_dir, e))?;
            if entries.next().is_some() {
                return Err(Error::Config(format!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&output_dir).map_err(|e| Error::storage(&output_dir, e))?;
        }

        self.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    pub fn detector(&self) -> &Arc<DetectorHandle> {
        &self.detector
    }

    /// Process one source image into a persisted result.
    pub async fn process_image(&self, source: &Path) -> Result<DetectionResult> {
        let id = Uuid::new_v4();
        info!("Processing {} as {}", source.display(), id);

        match self.run_stages(id, source).await {
            Ok(result) => {
                info!(
                    "Request {} done: {} walls, {} windows, {} doors",
                    id,
                    result.elements.walls.len(),
                    result.elements.windows.len(),
                    result.elements.doors.len()
                );
                Ok(result)
            }
            Err(e) => {
                warn!("Request {} failed: {}", id, e);
                self.discard_artifacts(id).await;
                Err(e)
            }
        }
    }

    async fn run_stages(&self, id: Uuid, source: &Path) -> Result<DetectionResult> {
        let layout = self.store.layout().clone();

        let normalized = self
            .normalize(id, source, layout.normalized_path(id))
            .await
            .map_err(|e| e.at_stage(Stage::Normalize, id))?;
        debug!(
            "Request {} normalized: content {:?} at offset {:?}",
            id,
            normalized.content_size(),
            normalized.offset()
        );

        let canvas = Arc::new(DynamicImage::ImageLuma8(normalized.into_image()));
        let detections = self
            .detector
            .detect(canvas.clone())
            .await
            .and_then(|detections| {
                check_contract(&detections, canvas.width(), canvas.height())?;
                Ok(detections)
            })
            .map_err(|e| e.at_stage(Stage::Detect, id))?;
        debug!("Request {} detected {} instances", id, detections.len());

        let extractor = self.extractor;
        let (elements, detections) = tokio::task::spawn_blocking(move || {
            let elements = extractor.extract(&detections);
            (elements, detections)
        })
        .await
        .map_err(|e| Error::Worker(e.to_string()).at_stage(Stage::Extract, id))?;

        let annotated_path = layout.annotated_path(id);
        tokio::task::spawn_blocking(move || {
            let annotated = render::annotate(&canvas, &detections);
            save_image_atomic(
                &annotated_path,
                &DynamicImage::ImageRgb8(annotated),
                ImageFormat::Jpeg,
            )
        })
        .await
        .map_err(|e| Error::Worker(e.to_string()))
        .and_then(|saved| saved)
        .map_err(|e| e.at_stage(Stage::Render, id))?;

        let result = DetectionResult {
            id,
            timestamp: Some(OffsetDateTime::now_utc()),
            filename: source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            elements,
            image_url: layout.image_url(id),
        };
        self.store
            .save(&result)
            .await
            .map_err(|e| e.at_stage(Stage::Persist, id))?;

        Ok(result)
    }

    async fn normalize(&self, id: Uuid, source: &Path, target: PathBuf) -> Result<NormalizedImage> {
        let normalizer = self.normalizer.clone();
        let source = source.to_path_buf();
        let debug_dir = self.debug.as_ref().map(|d| d.request_dir(id));

        tokio::task::spawn_blocking(move || {
            let img = ImageNormalizer::load(&source)?;
            let normalized = match &debug_dir {
                Some(dir) => {
                    std::fs::create_dir_all(dir).map_err(|e| Error::storage(dir, e))?;
                    dump_debug(dir, "00_input", &img.to_luma8());
                    normalizer.normalize_traced(&img, |name, raster| dump_debug(dir, name, raster))?
                }
                None => normalizer.normalize(&img)?,
            };
            normalized.save(&target)?;
            Ok(normalized)
        })
        .await
        .map_err(|e| Error::Worker(e.to_string()))?
    }

    /// Best-effort removal of whatever a failed request left behind.
    async fn discard_artifacts(&self, id: Uuid) {
        let layout = self.store.layout();
        for path in [
            layout.normalized_path(id),
            layout.annotated_path(id),
            layout.record_path(id),
        ] {
            for candidate in [staging_path(&path), path] {
                match tokio::fs::remove_file(&candidate).await {
                    Ok(()) => debug!("Removed {}", candidate.display()),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => warn!("Failed to remove {}: {}", candidate.display(), e),
                }
            }
        }
    }
}

/// Reject detector output that breaks the backend contract.
fn check_contract(detections: &[Detection], width: u32, height: u32) -> Result<()> {
    for (i, detection) in detections.iter().enumerate() {
        if detection.mask.dimensions() != (width, height) {
            return Err(Error::Inference(format!(
                "detection {} has a {:?} mask on a {}x{} image",
                i,
                detection.mask.dimensions(),
                width,
                height
            )));
        }
        if !detection.bbox.is_within(width, height) {
            return Err(Error::Inference(format!(
                "detection {} box {:?} outside {}x{}",
                i, detection.bbox, width, height
            )));
        }
        if detection.class == ElementClass::Background {
            return Err(Error::Inference(format!("detection {} has the background class", i)));
        }
    }
    Ok(())
}

fn dump_debug(dir: &Path, name: &str, raster: &GrayImage) {
    let path = dir.join(format!("{}.png", name));
    if let Err(e) = raster.save_with_format(&path, ImageFormat::Png) {
        warn!("Failed to save debug image {}: {}", path.display(), e);
    } else {
        debug!("Debug: saved {}", path.display());
    }
}

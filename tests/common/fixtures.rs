use std::sync::Arc;

use floorscan::{
    BoundingBox, Detection, DetectionOrchestrator, DetectionResult, DetectorConfig,
    DetectorHandle, ElementClass, ElementGroups, FsResultStore, InstanceMask, PipelineConfig,
};
use image::{ImageBuffer, Rgb};
use tempfile::{NamedTempFile, TempDir};
use time::OffsetDateTime;
use uuid::Uuid;

/// Seed used wherever tests need reproducible synthetic detections
pub const TEST_SEED: u64 = 42;

/// Creates a white test image with a dark frame drawn around it, like a
/// scanned floor plan outline.
/// The file will be automatically cleaned up when dropped.
pub fn create_test_image(width: u32, height: u32) -> NamedTempFile {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        let border = x < 20 || y < 20 || x + 20 >= width || y + 20 >= height;
        if border {
            Rgb([10u8, 10u8, 10u8])
        } else {
            Rgb([250u8, 250u8, 250u8])
        }
    });
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

/// Creates a file with a `.png` name that holds no image data.
pub fn create_garbage_file() -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp file");
    std::fs::write(file.path(), b"definitely not a png").expect("Failed to write garbage");
    file
}

/// Creates a store in a temporary directory.
/// Returns both the store and the temp directory (which must be kept alive).
pub async fn create_test_store() -> (FsResultStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let store = FsResultStore::open(dir.path(), "/api/floorplan/images")
        .await
        .expect("Failed to open test store");
    (store, dir)
}

pub fn seeded_config() -> PipelineConfig {
    PipelineConfig {
        detector: DetectorConfig::Synthetic {
            seed: Some(TEST_SEED),
        },
        ..PipelineConfig::default()
    }
}

/// Orchestrator with a seeded synthetic detector over a temporary data root.
pub async fn create_test_orchestrator() -> (DetectionOrchestrator, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let orchestrator = DetectionOrchestrator::open(seeded_config(), dir.path())
        .await
        .expect("Failed to open orchestrator");
    (orchestrator, dir)
}

/// Orchestrator sharing an existing detector handle.
pub async fn create_orchestrator_with(
    handle: Arc<DetectorHandle>,
) -> (DetectionOrchestrator, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let config = seeded_config();
    let store = FsResultStore::open(dir.path(), config.image_url_prefix.clone())
        .await
        .expect("Failed to open test store");
    (DetectionOrchestrator::new(config, handle, store), dir)
}

/// Number of files in each artifact directory under a data root.
pub fn artifact_counts(root: &std::path::Path) -> [usize; 3] {
    ["processed", "output", "results"].map(|sub| {
        std::fs::read_dir(root.join(sub))
            .map(|entries| entries.count())
            .unwrap_or(0)
    })
}

/// Detection whose mask is exactly the filled box.
pub fn make_detection(class: ElementClass, score: f32, rect: (u32, u32, u32, u32), size: u32) -> Detection {
    let (x1, y1, x2, y2) = rect;
    let mut mask = InstanceMask::new(size, size);
    mask.fill_rect(x1, y1, x2, y2, true);
    Detection {
        class,
        score,
        bbox: BoundingBox::new(x1 as f32, y1 as f32, x2 as f32, y2 as f32),
        mask,
    }
}

/// Stored result with no elements and the given timestamp.
pub fn make_result(timestamp: Option<OffsetDateTime>) -> DetectionResult {
    let id = Uuid::new_v4();
    DetectionResult {
        id,
        timestamp,
        filename: "plan.png".to_string(),
        elements: ElementGroups::default(),
        image_url: format!("/api/floorplan/images/{}_detected.jpg", id),
    }
}

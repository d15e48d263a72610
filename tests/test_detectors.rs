mod common;

use common::*;
use floorscan::{Detector, MaskRcnnDetector, SyntheticDetector};
use image::{DynamicImage, GrayImage};

fn blank_canvas(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, image::Luma([255u8])))
}

#[test]
fn test_synthetic_yields_every_class() -> anyhow::Result<()> {
    let mut detector = SyntheticDetector::with_seed(TEST_SEED);
    let detections = detector.detect(&blank_canvas(1024, 1024))?;

    let count = |class| detections.iter().filter(|d| d.class == class).count();
    assert!((3..=8).contains(&count(ElementClass::Wall)));
    assert!((2..=6).contains(&count(ElementClass::Window)));
    assert!((1..=4).contains(&count(ElementClass::Door)));
    assert_eq!(count(ElementClass::Background), 0);
    Ok(())
}

#[test]
fn test_synthetic_respects_contract() -> anyhow::Result<()> {
    let mut detector = SyntheticDetector::with_seed(7);
    for (w, h) in [(1024, 1024), (120, 80), (30, 30)] {
        for detection in detector.detect(&blank_canvas(w, h))? {
            assert_eq!(detection.mask.dimensions(), (w, h));
            assert!(detection.bbox.is_within(w, h), "{:?} outside {}x{}", detection.bbox, w, h);
            assert!((0.70..0.98).contains(&detection.score));
            // Foreground never leaks outside the box
            let [x1, y1, x2, y2] = detection.bbox.truncated();
            for y in 0..h {
                for x in 0..w {
                    let inside = (x as i32) >= x1 && (x as i32) < x2 && (y as i32) >= y1 && (y as i32) < y2;
                    if !inside {
                        assert!(!detection.mask.get(x, y));
                    }
                }
            }
        }
    }
    Ok(())
}

#[test]
fn test_synthetic_seed_is_reproducible() -> anyhow::Result<()> {
    let canvas = blank_canvas(512, 512);
    let first = SyntheticDetector::with_seed(99).detect(&canvas)?;
    let second = SyntheticDetector::with_seed(99).detect(&canvas)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_synthetic_rejects_empty_image() {
    let mut detector = SyntheticDetector::with_seed(1);
    let err = detector.detect(&blank_canvas(0, 0)).unwrap_err();
    assert!(matches!(err, Error::Inference(_)));
}

#[test]
fn test_mask_rcnn_missing_weights() {
    let result = MaskRcnnDetector::load(std::path::Path::new("/nonexistent/floorplan.rten"));
    assert!(matches!(result, Err(Error::ModelLoad { .. })));
}

#[test]
fn test_mask_rcnn_garbage_weights() {
    let file = create_garbage_file();
    let result = MaskRcnnDetector::load(file.path());
    assert!(matches!(result, Err(Error::ModelLoad { .. })));
}

#[test]
fn test_config_factory_builds_selected_backend() -> anyhow::Result<()> {
    let detector = seeded_config().detector_factory().build()?;
    assert_eq!(detector.name(), "synthetic");

    let config = PipelineConfig {
        detector: DetectorConfig::MaskRcnn {
            weights: "/nonexistent/floorplan.rten".into(),
        },
        ..PipelineConfig::default()
    };
    assert!(config.detector_factory().build().is_err());
    Ok(())
}

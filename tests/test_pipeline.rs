mod common;

use common::*;
use uuid::Uuid;

#[tokio::test]
async fn test_end_to_end_landscape_plan() -> anyhow::Result<()> {
    let (orchestrator, _dir) = create_test_orchestrator().await;
    let image = create_test_image(2000, 1000);

    let result = orchestrator.process_image(image.path()).await?;

    assert!(!result.elements.walls.is_empty());
    assert!(!result.elements.windows.is_empty());
    assert!(!result.elements.doors.is_empty());
    for element in result.elements.iter() {
        let [x1, y1, x2, y2] = element.bbox;
        assert!(0 <= x1 && x1 < x2 && x2 <= 1024);
        assert!(0 <= y1 && y1 < y2 && y2 <= 1024);
    }
    assert!(result.elements.walls.iter().all(|e| e.element_type == ElementClass::Wall));
    assert!(result.timestamp.is_some());
    assert_eq!(
        result.filename,
        image.path().file_name().unwrap().to_string_lossy()
    );
    assert_eq!(
        result.image_url,
        format!("/api/floorplan/images/{}_detected.jpg", result.id)
    );

    let listed = orchestrator.store().list().await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, result.id);
    assert_eq!(listed[0], result);
    Ok(())
}

#[tokio::test]
async fn test_artifacts_written() -> anyhow::Result<()> {
    let (orchestrator, _dir) = create_test_orchestrator().await;
    let image = create_test_image(2000, 1000);

    let result = orchestrator.process_image(image.path()).await?;
    let layout = orchestrator.store().layout();

    let normalized = image::open(layout.normalized_path(result.id))?;
    assert_eq!((normalized.width(), normalized.height()), (1024, 1024));

    let annotated_path = orchestrator.store().annotated_image(result.id).await?;
    assert_eq!(annotated_path, layout.annotated_path(result.id));
    let annotated = image::open(&annotated_path)?;
    assert_eq!((annotated.width(), annotated.height()), (1024, 1024));

    assert!(layout.record_path(result.id).is_file());
    Ok(())
}

#[tokio::test]
async fn test_requests_get_distinct_ids() -> anyhow::Result<()> {
    let (orchestrator, _dir) = create_test_orchestrator().await;
    let image = create_test_image(640, 480);

    let (a, b) = tokio::join!(
        orchestrator.process_image(image.path()),
        orchestrator.process_image(image.path())
    );
    let (a, b) = (a?, b?);
    assert_ne!(a.id, b.id);
    assert_eq!(orchestrator.store().list().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_unknown_id_not_found() -> anyhow::Result<()> {
    let (orchestrator, _dir) = create_test_orchestrator().await;
    let image = create_test_image(400, 400);
    orchestrator.process_image(image.path()).await?;

    let err = orchestrator.store().get(Uuid::new_v4()).await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_invalid_image_leaves_nothing_behind() -> anyhow::Result<()> {
    let (orchestrator, dir) = create_test_orchestrator().await;
    let garbage = create_garbage_file();

    let err = orchestrator.process_image(garbage.path()).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Normalize));
    assert!(matches!(err.root(), Error::InvalidImage(_)));

    assert!(orchestrator.store().list().await?.is_empty());
    assert_eq!(artifact_counts(dir.path()), [0, 0, 0]);
    // The detector is never touched for a rejected image
    assert!(!orchestrator.detector().is_initialized());
    Ok(())
}

#[tokio::test]
async fn test_debug_dump_per_request() -> anyhow::Result<()> {
    let (orchestrator, _dir) = create_test_orchestrator().await;
    let debug_dir = tempfile::TempDir::new()?;
    let orchestrator = orchestrator.with_debug(debug_dir.path().to_path_buf())?;
    let image = create_test_image(500, 250);

    let result = orchestrator.process_image(image.path()).await?;

    let request_dir = debug_dir.path().join(result.id.to_string());
    for stage in ["00_input", "01_grayscale", "02_resized", "03_blurred", "04_binary", "05_canvas"] {
        assert!(request_dir.join(format!("{}.png", stage)).is_file(), "missing {}", stage);
    }
    Ok(())
}

#[tokio::test]
async fn test_debug_dir_must_be_empty() -> anyhow::Result<()> {
    let (orchestrator, _dir) = create_test_orchestrator().await;
    let debug_dir = tempfile::TempDir::new()?;
    std::fs::write(debug_dir.path().join("leftover.png"), b"x")?;

    let err = orchestrator.with_debug(debug_dir.path().to_path_buf()).err();
    assert!(matches!(err, Some(Error::Config(_))));
    Ok(())
}

#[tokio::test]
async fn test_persist_failure_removes_images() -> anyhow::Result<()> {
    let (orchestrator, dir) = create_test_orchestrator().await;
    let image = create_test_image(800, 600);

    // A plain file where the results directory should be makes every record write fail
    let results_dir = orchestrator.store().layout().results_dir();
    std::fs::remove_dir(&results_dir)?;
    std::fs::write(&results_dir, b"in the way")?;

    let err = orchestrator.process_image(image.path()).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Persist));
    assert!(matches!(err.root(), Error::Storage { .. }));

    // Normalized and annotated images were written, then removed
    let [processed, output, _] = artifact_counts(dir.path());
    assert_eq!((processed, output), (0, 0));
    Ok(())
}

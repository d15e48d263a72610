use tracing::debug;

use crate::detection::contours::largest_external_contour;
use crate::models::{Detection, ElementClass, ElementGroups, GeometricElement};

/// Converts raw detections into class-grouped polygons.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryExtractor;

impl GeometryExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Outline and box for one detection. The outline is the largest external
    /// contour of the mask, or empty when the mask has no foreground.
    pub fn element(&self, detection: &Detection) -> GeometricElement {
        let contour = largest_external_contour(&detection.mask.to_gray()).unwrap_or_default();

        GeometricElement {
            element_type: detection.class,
            confidence: f64::from(detection.score),
            bbox: detection.bbox.truncated(),
            contour,
        }
    }

    /// Group detections into walls, windows and doors, keeping detector order
    /// within each group. Background detections are dropped.
    pub fn extract(&self, detections: &[Detection]) -> ElementGroups {
        let mut groups = ElementGroups::default();
        let mut dropped = 0usize;

        for detection in detections {
            let group = match detection.class {
                ElementClass::Wall => &mut groups.walls,
                ElementClass::Window => &mut groups.windows,
                ElementClass::Door => &mut groups.doors,
                // TODO: a new class needs its own group in ElementGroups and the record schema
                ElementClass::Background => {
                    dropped += 1;
                    continue;
                }
            };
            group.push(self.element(detection));
        }

        debug!(
            "Extracted {} walls, {} windows, {} doors ({} dropped)",
            groups.walls.len(),
            groups.windows.len(),
            groups.doors.len(),
            dropped
        );

        groups
    }
}

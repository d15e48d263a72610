mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from floorscan for tests
#[allow(unused_imports)]
pub use floorscan::{
    BoundingBox, Detection, DetectionOrchestrator, DetectionResult, DetectorConfig,
    DetectorFactory, DetectorHandle, ElementClass, ElementGroups, Error, FsResultStore,
    GeometricElement, InstanceMask, PipelineConfig, ResultRepository, Stage,
};

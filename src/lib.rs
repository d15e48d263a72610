pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod store;

pub use config::{DetectorConfig, PipelineConfig};
pub use detection::{GeometryExtractor, ImageNormalizer, NormalizedImage};
pub use detector::{Detector, DetectorFactory, DetectorHandle, MaskRcnnDetector, SyntheticDetector};
pub use error::{Error, Result, Stage};
pub use models::{
    BoundingBox, Detection, DetectionResult, ElementClass, ElementGroups, GeometricElement,
    InstanceMask,
};
pub use pipeline::{DebugConfig, DetectionOrchestrator};
pub use store::{ArtifactLayout, FsResultStore, ResultRepository};

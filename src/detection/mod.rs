pub mod contours;
pub mod geometry;
pub mod preprocessing;

pub use geometry::GeometryExtractor;
pub use preprocessing::{ImageNormalizer, NormalizedImage};

//! Error types for floorscan

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Pipeline stage a request was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalize,
    Detect,
    Extract,
    Render,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Normalize => "normalize",
            Stage::Detect => "detect",
            Stage::Extract => "extract",
            Stage::Render => "render",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Unreadable input or an image with a zero dimension. Not retryable.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Failed to load model from {path:?}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// Detector construction failed; the next request will try again.
    #[error("Detector unavailable: {0}")]
    DetectorUnavailable(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Result {0} not found")]
    NotFound(Uuid),

    #[error("Storage error at {path:?}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt record {path:?}: {source}")]
    CorruptRecord {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("{stage} stage failed for request {id}: {source}")]
    Stage {
        stage: Stage,
        id: Uuid,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn at_stage(self, stage: Stage, id: Uuid) -> Self {
        Error::Stage {
            stage,
            id,
            source: Box::new(self),
        }
    }

    /// The underlying failure with any stage context peeled off.
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// The stage the failure was attributed to, if it came out of the pipeline.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

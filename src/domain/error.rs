// ============================================================
// Layer 3 - Error Taxonomy
// ============================================================
// Every failure the core can report. The application and CLI
// layers wrap these in anyhow::Error with extra context; the
// serving boundary matches on them to tell "could not evaluate"
// apart from "evaluated, not a match".
//
//   Configuration family (fatal, no retry):
//     Configuration, UnsupportedBackbone, EmptyCorpus,
//     CheckpointNotFound
//   Per-sample:
//     DataIntegrity  - an image failed to decode
//   Serving boundary:
//     NoFaceDetected - the locator returned zero faces
//     InvalidInput   - malformed tensors / arrays
//
// NaN losses are deliberately absent: they propagate as values.

use std::path::PathBuf;

use thiserror::Error;

/// Which side of a verification pair an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    First,
    Second,
}

impl std::fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageSlot::First  => write!(f, "first"),
            ImageSlot::Second => write!(f, "second"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FaceVerifyError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("unsupported backbone '{0}' (expected one of: resnet18, resnet50)")]
    UnsupportedBackbone(String),

    #[error("no valid identity classes found in '{}'", .0.display())]
    EmptyCorpus(PathBuf),

    #[error("checkpoint not found: '{}'", .0.display())]
    CheckpointNotFound(PathBuf),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("failed to decode image '{}': {reason}", .path.display())]
    DataIntegrity { path: PathBuf, reason: String },

    #[error("no face detected in {0} image")]
    NoFaceDetected(ImageSlot),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FaceVerifyError {
    /// True for the configuration family: surfaced immediately, never retried.
    pub fn is_fatal_config(&self) -> bool {
        matches!(
            self,
            FaceVerifyError::Configuration(_)
                | FaceVerifyError::UnsupportedBackbone(_)
                | FaceVerifyError::EmptyCorpus(_)
                | FaceVerifyError::CheckpointNotFound(_)
        )
    }
}

pub type Result<T, E = FaceVerifyError> = std::result::Result<T, E>;

//! Capture collaborator.
//!
//! Rendering and browser automation live outside this crate. A [`Capture`]
//! implementation receives an opaque target handle (a whole viewport, a
//! sub-region, a file) and writes an image to the destination path.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from capturing an artifact. Never retried.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture target unavailable: {0}")]
    TargetUnavailable(String),

    #[error("Failed to write artifact {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Capture failed: {0}")]
    Failed(String),
}

/// Produces an image for a visual target.
#[async_trait]
pub trait Capture: Send + Sync {
    /// Handle for what to capture: a viewport, a region, a file.
    type Target: ?Sized + Sync;

    /// Write an image of `target` to `destination`.
    async fn capture(&self, target: &Self::Target, destination: &Path) -> Result<(), CaptureError>;
}

/// Captures by copying an existing image file.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileCapture;

#[async_trait]
impl Capture for FileCapture {
    type Target = Path;

    async fn capture(&self, target: &Path, destination: &Path) -> Result<(), CaptureError> {
        if !crate::files::exists(target).await {
            return Err(CaptureError::TargetUnavailable(format!(
                "{} does not exist",
                target.display()
            )));
        }

        tokio::fs::copy(target, destination)
            .await
            .map(|_| ())
            .map_err(|source| CaptureError::Io {
                path: destination.to_path_buf(),
                source,
            })
    }
}

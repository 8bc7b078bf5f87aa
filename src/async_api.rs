//! Async entry point

use crate::{capture_with, CaptureConfig, CaptureRequest, Error, Result};
use std::path::PathBuf;

/// Capture from async code.
///
/// The browser driver is blocking, so the whole pipeline runs on tokio's
/// blocking pool. The run is still one sequential capture; awaiting the
/// returned future just keeps the calling task from stalling a runtime worker.
pub async fn capture_async(request: CaptureRequest, config: CaptureConfig) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || capture_with(&request, &config))
        .await
        .map_err(|e| Error::Other(format!("Capture worker failed: {}", e)))?
}

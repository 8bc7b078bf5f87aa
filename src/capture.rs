//! The capture pipeline

use crate::cdp::CdpSession;
use crate::{output, source, CaptureConfig, CaptureRequest, Error, Result};
use chrono::Local;
use log::{debug, info};
use std::path::PathBuf;

/// Capture `request` with the default configuration.
///
/// Returns the path of the written PNG.
pub fn capture(request: &CaptureRequest) -> Result<PathBuf> {
    capture_with(request, &CaptureConfig::default())
}

/// Capture `request` using `config`.
///
/// Steps run strictly in order and the first failure aborts the run. The
/// output directory is created before anything else; the browser is only
/// launched once the source document is known to exist, and it is closed on
/// every path out of this function. No image is written unless the capture
/// succeeded.
pub fn capture_with(request: &CaptureRequest, config: &CaptureConfig) -> Result<PathBuf> {
    let started_at = Local::now();

    output::ensure_output_dir(&config.output_dir)?;
    let output_path =
        output::resolve_output_path(&config.output_dir, request.output_name.as_deref(), &started_at)?;
    let url = source::file_url(&request.source)?;
    debug!("capturing {} -> {}", url, output_path.display());

    let session = CdpSession::launch(config, request.viewport)?;
    session.load(&url)?;
    session.settle();
    let png = session.capture_full_page()?;

    std::fs::write(&output_path, &png).map_err(|source| Error::Write {
        path: output_path.clone(),
        source,
    })?;
    session.close();

    info!("wrote {} ({} bytes)", output_path.display(), png.len());
    Ok(output_path)
}

//! Browser executable discovery
//!
//! Captures need a Chrome or Chromium binary. An explicit path from the
//! config wins; otherwise the usual install locations (and the `CHROME`
//! environment variable) are searched. Without the `fetch` feature a missing
//! browser is a hard error. With it, the launcher downloads a Chromium build
//! on first use.

use crate::{CaptureConfig, Error, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Where the browser binary comes from for this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserSource {
    /// An executable that already exists on disk
    Installed(PathBuf),
    /// No local executable; the launcher downloads one
    Download,
}

impl BrowserSource {
    pub fn path(&self) -> Option<PathBuf> {
        match self {
            BrowserSource::Installed(p) => Some(p.clone()),
            BrowserSource::Download => None,
        }
    }
}

/// Decide which browser to launch for `config`.
pub fn locate_browser(config: &CaptureConfig) -> Result<BrowserSource> {
    select_browser(
        config.browser_path.as_deref(),
        headless_chrome::browser::default_executable,
        cfg!(feature = "fetch"),
    )
}

fn select_browser<F>(explicit: Option<&Path>, detect: F, can_download: bool) -> Result<BrowserSource>
where
    F: FnOnce() -> std::result::Result<PathBuf, String>,
{
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(Error::Provisioning(format!(
                "configured browser {} does not exist",
                path.display()
            )));
        }
        debug!("using configured browser {}", path.display());
        return Ok(BrowserSource::Installed(path.to_path_buf()));
    }

    match detect() {
        Ok(path) => {
            debug!("found browser {}", path.display());
            Ok(BrowserSource::Installed(path))
        }
        Err(_) if can_download => {
            info!("no installed Chrome found; a Chromium build will be downloaded");
            Ok(BrowserSource::Download)
        }
        Err(reason) => Err(Error::Provisioning(format!(
            "{}. Install Chrome or Chromium, point CHROME at the binary, \
             or build with the `fetch` feature",
            reason
        ))),
    }
}

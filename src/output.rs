//! Output path resolution
//!
//! Every screenshot lands in a single output directory. Callers may pick the
//! filename but never the directory: only the last component of a requested
//! name is kept.

use crate::{Error, Result};
use chrono::{DateTime, Local};
use log::debug;
use std::path::{Path, PathBuf};

/// Default directory, relative to the working directory, that receives screenshots
pub const DEFAULT_OUTPUT_DIR: &str = "screenshots";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Create `dir` (and any missing parents). An existing directory is not an error.
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| Error::OutputDir {
        path: dir.to_path_buf(),
        source,
    })?;
    debug!("output directory ready: {}", dir.display());
    Ok(())
}

/// Generated filename for a run that started at `started_at`
pub fn timestamped_name(started_at: &DateTime<Local>) -> String {
    format!("screenshot_{}.png", started_at.format(TIMESTAMP_FORMAT))
}

/// Resolve the final image path inside `dir`.
///
/// With no `name`, a timestamped filename is generated from `started_at`.
/// With a name, any directory portion is discarded.
pub fn resolve_output_path(
    dir: &Path,
    name: Option<&str>,
    started_at: &DateTime<Local>,
) -> Result<PathBuf> {
    let file_name = match name {
        None => timestamped_name(started_at),
        Some(name) => Path::new(name)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::InvalidInput(format!("output name {:?} has no file name", name))
            })?,
    };

    Ok(dir.join(file_name))
}

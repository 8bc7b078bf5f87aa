//! Source document resolution

use crate::{Error, Result};
use std::path::Path;
use url::Url;

/// Resolve `path` to an absolute `file://` URL.
///
/// The path must name an existing regular file; anything else cannot be
/// rendered and is reported as invalid input.
pub fn file_url(path: &Path) -> Result<Url> {
    let absolute = path.canonicalize().map_err(|e| {
        Error::InvalidInput(format!("source document {} not found: {}", path.display(), e))
    })?;

    if !absolute.is_file() {
        return Err(Error::InvalidInput(format!(
            "source document {} is not a file",
            absolute.display()
        )));
    }

    Url::from_file_path(&absolute).map_err(|_| {
        Error::InvalidInput(format!(
            "cannot express {} as a file URL",
            absolute.display()
        ))
    })
}

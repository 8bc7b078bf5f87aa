//! Error types for the capture pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing a screenshot
#[derive(Error, Debug)]
pub enum Error {
    /// No usable browser executable could be found or installed
    #[error("Browser provisioning failed: {0}")]
    Provisioning(String),

    /// The source document or output name cannot be used
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Failed to start the browser or open a tab
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Failed to load the source document
    #[error("Failed to load page: {0}")]
    Navigation(String),

    /// The page did not become network-idle in time
    #[error("Page did not become idle within {0}ms")]
    Timeout(u64),

    /// Failed to measure or capture the page
    #[error("Screenshot failed: {0}")]
    Capture(String),

    /// Failed to create the output directory
    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the image file
    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

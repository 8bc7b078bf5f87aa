//! htmlshot
//!
//! Capture a full-page PNG screenshot of a local HTML document with headless
//! Chrome. A capture is one linear run: make sure the output directory
//! exists, pick the output filename, launch the browser, load the document
//! over `file://`, wait for the network to go quiet, let animations settle,
//! screenshot the whole scrollable page and close the browser.
//!
//! # Example
//!
//! ```no_run
//! use htmlshot::{CaptureConfig, CaptureRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Written to screenshots/screenshot_<YYYY-MM-DD_HH-MM-SS>.png
//! let path = htmlshot::capture(&CaptureRequest::new("index.html"))?;
//! println!("Screenshot saved to: {}", path.display());
//!
//! // Custom viewport and output directory
//! let config = CaptureConfig {
//!     output_dir: "build/shots".into(),
//!     settle_ms: 250,
//!     ..Default::default()
//! };
//! let request = CaptureRequest::new("index.html")
//!     .output_name("board.png")
//!     .viewport(1920, 1080);
//! htmlshot::capture_with(&request, &config)?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod cdp;
pub mod output;
pub mod provision;
pub mod source;

mod capture;
pub use capture::{capture, capture_with};

// Async-friendly entry point (runs the blocking pipeline off the runtime)
pub mod async_api;
pub use async_api::capture_async;

/// Configuration shared by every capture
///
/// The defaults match the command-line tool: screenshots go to
/// `screenshots/` under the working directory, navigation gets 30 seconds,
/// the page must stay network-quiet for 500ms and then settles for one
/// second before capture.
///
/// # Examples
///
/// ```
/// let cfg = htmlshot::CaptureConfig::default();
/// assert_eq!(cfg.output_dir, std::path::PathBuf::from("screenshots"));
/// assert_eq!(cfg.timeout_ms, 30000);
/// ```
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Directory that receives every screenshot
    pub output_dir: PathBuf,
    /// Navigation and network-idle deadline in milliseconds
    pub timeout_ms: u64,
    /// Quiet window with no new network activity before the page counts as idle
    pub network_idle_ms: u64,
    /// Delay after network idle so animations can finish
    pub settle_ms: u64,
    /// Explicit Chrome/Chromium executable; auto-detected when `None`
    pub browser_path: Option<PathBuf>,
    /// Whether to keep Chrome's sandbox enabled
    pub sandbox: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(output::DEFAULT_OUTPUT_DIR),
            timeout_ms: 30000,
            network_idle_ms: 500,
            settle_ms: 1000,
            browser_path: None,
            sandbox: true,
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// What to capture and where to put it
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    /// Local HTML document to render
    pub source: PathBuf,
    /// Requested output filename; only its last component is used
    pub output_name: Option<String>,
    pub viewport: Viewport,
}

impl CaptureRequest {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output_name: None,
            viewport: Viewport::default(),
        }
    }

    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Viewport { width, height };
        self
    }
}

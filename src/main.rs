use anyhow::Context;
use clap::Parser;
use htmlshot::CaptureRequest;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Capture a full-page screenshot of a local HTML document
#[derive(Parser, Debug)]
#[command(name = "htmlshot", version, about)]
struct Cli {
    /// HTML document to render
    #[arg(default_value = "index.html")]
    source: PathBuf,

    /// Output filename inside screenshots/ (directory part is ignored);
    /// defaults to screenshot_<YYYY-MM-DD_HH-MM-SS>.png
    output: Option<String>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let mut request = CaptureRequest::new(cli.source.clone());
    if let Some(name) = cli.output {
        request = request.output_name(name);
    }

    let path = htmlshot::capture(&request)
        .with_context(|| format!("Failed to capture {}", cli.source.display()))?;
    println!("Screenshot saved to: {}", path.display());
    Ok(())
}

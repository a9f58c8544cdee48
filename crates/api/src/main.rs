//! Driver Behavior Monitor - Main Entry Point

use std::path::PathBuf;

use anyhow::Context;
use api::{init_logging, init_metrics, parse_source_arg, run, Settings};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Driver behavior monitor")]
struct Args {
    /// Settings file (TOML). Missing files are skipped.
    #[arg(long, short, env = "DRIVER_MONITOR_CONFIG", default_value = "driver-monitor.toml")]
    config: PathBuf,

    /// Media source: a camera device (/dev/video0, stub://name) or a video path
    #[arg(long)]
    source: Option<String>,

    /// HTTP bind address
    #[arg(long)]
    bind: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(&args.config)
        .with_context(|| format!("Failed to load settings from {}", args.config.display()))?;
    if let Some(source) = &args.source {
        settings.source = parse_source_arg(source);
    }
    if let Some(bind) = args.bind {
        settings.server.bind = bind;
    }
    settings.logging.json |= args.json_logs;

    init_logging(&settings.logging.level, settings.logging.json)?;
    info!("=== Driver Behavior Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let metrics = init_metrics()?;
    run(settings, Some(metrics)).await
}

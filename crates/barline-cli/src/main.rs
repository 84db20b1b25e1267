//! barline CLI entry point.

mod args;
mod runner;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use barline_core::config::{Config, LogLevel};
use barline_core::detect::FeatureDetector;
use barline_core::error::{CaptureError, ConfigError, DriverError};
use barline_core::frame::{Frame, FrameSource};
use barline_core::region::CaptureRegion;
use barline_core::status::StatusTracker;
use chrono::Utc;
use clap::Parser;
use serde_json::json;
use tracing::{error, info, warn};

use crate::args::{CaptureArgs, Cli, Commands, DetectArgs, RunArgs, SetRegionArgs};
use crate::runner::preview::{render_preview, run_preview, save_preview};
use crate::runner::{
    ConfigStore, DesktopBackend, LoopDriver, LoopSettings, PreviewSettings, RunSummary,
    WatchObserver,
};

fn main() {
    let cli = Cli::parse();

    let store = match &cli.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::default_location(),
    };

    // The log level lives in the config, so load it before tracing is set up.
    let loaded = store.load();
    let level = loaded
        .as_ref()
        .map(|l| l.config.debug.log_level)
        .unwrap_or_default();
    init_tracing(level);

    let loaded = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };
    for note in &loaded.notes {
        warn!("Config: {}", note);
    }

    if let Err(e) = run_command(cli.command, &store, loaded.config) {
        error!("{:#}", e);
        if let Some(hint) = suggestion_for(&e) {
            eprintln!("hint: {}", hint);
        }
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise the configured level applies.
fn init_tracing(level: LogLevel) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn suggestion_for(e: &anyhow::Error) -> Option<&'static str> {
    if let Some(e) = e.downcast_ref::<ConfigError>() {
        return Some(e.suggestion());
    }
    if let Some(e) = e.downcast_ref::<DriverError>() {
        return Some(e.suggestion());
    }
    e.downcast_ref::<CaptureError>().map(CaptureError::suggestion)
}

fn run_command(command: Commands, store: &ConfigStore, config: Config) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => run_loop(args, config),
        Commands::SetRegion(args) => set_region(args, store),
        Commands::Capture(args) => capture_once(args, &config),
        Commands::Detect(args) => detect_image(args, &config),
        Commands::Config => {
            let out = json!({
                "path": store.path(),
                "config": config,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
    }
}

fn run_loop(args: RunArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(region) = args.region {
        config.capture.region = Some(region);
    }
    if let Some(hz) = args.hz {
        config.control.loop_hz = hz;
    }
    // Overrides go through the same repairs as the file.
    let (config, notes) = config.sanitize();
    for note in &notes {
        warn!("Override: {}", note);
    }
    let region = config.region()?;

    let runtime = tokio::runtime::Runtime::new()?;
    let summary = runtime.block_on(async {
        let (observer, rx) = WatchObserver::channel();
        let tracker = StatusTracker::new(config.control.tolerance_px, config.control.lost_after());
        let preview = tokio::spawn(run_preview(
            rx,
            PreviewSettings::from_config(&config, args.preview),
            tracker,
        ));

        let mut driver = LoopDriver::new(
            DesktopBackend::from_config(&config),
            Arc::new(observer),
            LoopSettings::from_config(&config),
        );
        let started_at = Utc::now();
        driver.start(region)?;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, stopping");
            }
            _ = sigterm() => {
                info!("Received SIGTERM, stopping");
            }
            _ = time_limit(config.safety.max_run()) => {
                info!("Reached max_run_seconds, stopping");
            }
        }

        driver.stop()?;
        let summary = RunSummary::new(started_at, Utc::now(), &driver.stats());
        // Dropping the driver drops the last sender, which ends the preview task.
        drop(driver);
        if let Err(e) = preview.await {
            warn!("Preview task failed: {}", e);
        }
        anyhow::Ok(summary)
    })?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn set_region(args: SetRegionArgs, store: &ConfigStore) -> anyhow::Result<()> {
    let region = CaptureRegion::from_signed(args.x, args.y, args.w, args.h)?;
    let loaded = store.set_region(region)?;
    for note in &loaded.notes {
        warn!("Config: {}", note);
    }
    info!("Saved region {} to {}", region, store.path().display());
    println!("{}", serde_json::to_string_pretty(&json!({ "region": region }))?);
    Ok(())
}

fn capture_once(args: CaptureArgs, config: &Config) -> anyhow::Result<()> {
    let region = config.region()?;
    let mut source = DesktopBackend::from_config(config).source();
    let frame = source.capture(&region)?;
    report_detection(&frame, config, args.out.as_deref())
}

fn detect_image(args: DetectArgs, config: &Config) -> anyhow::Result<()> {
    let img = image::open(&args.image)
        .with_context(|| format!("Failed to read image {}", args.image.display()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    let frame = Frame::from_rgba(img.into_raw(), width, height);
    report_detection(&frame, config, None)
}

fn report_detection(
    frame: &Frame,
    config: &Config,
    out: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    let result = FeatureDetector::new(config.vision.clone()).detect_frame(frame);
    if let Some(path) = out {
        let overlay = config
            .debug
            .draw_overlay
            .then_some((config.vision.strip_left, config.vision.strip_right));
        save_preview(&render_preview(frame, &result, overlay)?, path)?;
        info!("Saved capture to {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn time_limit(limit: Option<Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending::<()>().await,
    }
}

/// Wait for SIGTERM signal (Unix only).
///
/// If signal registration fails, logs a warning and waits indefinitely.
#[cfg(unix)]
async fn sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(
                "Failed to register SIGTERM handler: {}, only Ctrl+C will stop the loop",
                e
            );
            std::future::pending::<()>().await;
        }
    }
}

/// SIGTERM is not available on non-Unix platforms; use a never-completing future.
#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}

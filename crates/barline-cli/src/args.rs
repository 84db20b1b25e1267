//! CLI argument parsing with clap derive macros.

use std::path::PathBuf;

use barline_core::region::CaptureRegion;
use clap::{Parser, Subcommand};

/// Screen-reading timing assistant for bar/reference-line minigames.
///
/// Watches a screen region for a bright reference line and a dark bar,
/// and taps the mouse button to keep the bar on the line.
#[derive(Debug, Parser)]
#[command(name = "barline", version)]
pub struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the control loop until Ctrl+C, SIGTERM or the configured time limit
    #[command(after_help = "\
Examples:
  barline run                              # Use the saved region
  barline run --region 820,400,60,300      # Override the region for this run
  barline run --preview /tmp/preview.png   # Keep an annotated preview image
  barline run --hz 120                     # Tick faster than the configured rate

A JSON run summary is printed on exit.")]
    Run(RunArgs),

    /// Save the capture region to the config file
    #[command(after_help = "\
Coordinates are relative to the selected monitor, before DPI scaling.

Examples:
  barline set-region 820 400 60 300")]
    SetRegion(SetRegionArgs),

    /// Capture the region once and print what was detected
    Capture(CaptureArgs),

    /// Run detection on an image file and print the result
    Detect(DetectArgs),

    /// Print the effective configuration and where it lives
    Config,
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Capture region as X,Y,W,H (not saved)
    #[arg(long, value_name = "X,Y,W,H")]
    pub region: Option<CaptureRegion>,

    /// Write an annotated preview PNG here while running
    #[arg(long, value_name = "PATH")]
    pub preview: Option<PathBuf>,

    /// Loop rate in ticks per second (20-240)
    #[arg(long, value_name = "N")]
    pub hz: Option<u32>,
}

#[derive(Debug, clap::Args)]
#[command(allow_negative_numbers = true)]
pub struct SetRegionArgs {
    pub x: i64,
    pub y: i64,
    /// Width in pixels
    pub w: i64,
    /// Height in pixels
    pub h: i64,
}

#[derive(Debug, clap::Args)]
pub struct CaptureArgs {
    /// Also save the annotated capture as a PNG
    #[arg(short, long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, clap::Args)]
pub struct DetectArgs {
    /// Image to analyse (any format the image crate reads)
    pub image: PathBuf,
}

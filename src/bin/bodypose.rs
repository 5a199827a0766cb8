//! Body-pose landmark extraction: annotated video plus a 99-column track CSV.

use anyhow::{Context, Result};
use clap::Parser;
use mocap_pipeline::{
    app::BodyPoseApp,
    cli::{init_logging, normalize_args, Arity, Display, FlagSpec},
    config::Config,
};
use log::info;
use std::path::PathBuf;

const FLAGS: [FlagSpec; 4] = [
    FlagSpec::new("input", Arity::One),
    FlagSpec::new("display", Arity::One),
    FlagSpec::new("config", Arity::One),
    FlagSpec::new("debug", Arity::Switch),
];

#[derive(Parser, Debug)]
#[command(author, version, about = "Extract body-pose landmark tracks from a video", long_about = None)]
struct Args {
    /// Video to process (defaults to the configured sample video)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Show the annotated frames while processing (ESC stops)
    #[arg(long, value_enum, default_value_t = Display::Off)]
    display: Display,

    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse_from(normalize_args(
        std::env::args_os().map(|a| a.to_string_lossy().into_owned()),
        &FLAGS,
    ));
    init_logging(if args.debug { "debug" } else { "info" });

    let config = Config::load_or_default(args.config.as_deref());
    config.validate()?;

    let app = BodyPoseApp::new(config, args.input, args.display.enabled());
    info!("Using input video: {}", app.input().display());
    let report = app
        .run()
        .with_context(|| format!("Body pose extraction failed for {}", app.input().display()))?;

    println!("Processed video saved to {}", report.outputs.video.display());
    println!("Landmark track saved to {}", report.outputs.track.display());
    println!(
        "{} frames: {} detected, {} carried forward, {} zero-filled",
        report.summary.total(),
        report.summary.detected,
        report.summary.carried_forward,
        report.summary.zero_filled
    );
    Ok(())
}

//! Head orientation from facial landmarks on a video file or the webcam.

use anyhow::{Context, Result};
use clap::Parser;
use mocap_pipeline::{
    app::{HeadPoseApp, HeadPoseInput},
    cli::{init_logging, normalize_args, Arity, Display, FlagSpec, Verbosity},
    config::Config,
};
use std::path::PathBuf;

const FLAGS: [FlagSpec; 6] = [
    FlagSpec::new("input", Arity::One),
    FlagSpec::new("i", Arity::One),
    FlagSpec::new("verbose", Arity::One),
    FlagSpec::new("v", Arity::One),
    FlagSpec::new("display", Arity::One),
    FlagSpec::new("config", Arity::One),
];

#[derive(Parser, Debug)]
#[command(author, version, about = "Head pose estimation", long_about = None)]
struct Args {
    /// Path to input video file (webcam when omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Verbosity level: war, cam, all
    #[arg(short, long, value_enum)]
    verbose: Option<Verbosity>,

    /// Show the annotated frames while processing ('q' stops)
    #[arg(long, value_enum, default_value_t = Display::On)]
    display: Display,

    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse_from(normalize_args(
        std::env::args_os().map(|a| a.to_string_lossy().into_owned()),
        &FLAGS,
    ));
    init_logging(Verbosity::filter(args.verbose));

    let config = Config::load_or_default(args.config.as_deref());
    config.validate()?;

    let app = HeadPoseApp::new(config, args.input, args.display.enabled());
    match app.input() {
        HeadPoseInput::File(path) => println!("Using video file: {}", path.display()),
        HeadPoseInput::Camera(index) => println!("Using webcam {index}"),
    }
    let report = app.run().context("Head pose estimation failed")?;

    println!("Processed video saved to {}", report.outputs.video.display());
    println!("Landmark track saved to {}", report.outputs.track.display());
    Ok(())
}

//! Cut the first seconds of a video, optionally cropped to a window.

use anyhow::{Context, Result};
use clap::Parser;
use mocap_pipeline::{
    cli::{init_logging, normalize_args, Arity, FlagSpec},
    config::Config,
    snippet::cut_snippet,
};
use std::path::PathBuf;

const FLAGS: [FlagSpec; 6] = [
    FlagSpec::new("input", Arity::One),
    FlagSpec::new("output", Arity::One),
    FlagSpec::new("duration", Arity::One),
    FlagSpec::new("nocrop", Arity::Switch),
    FlagSpec::new("config", Arity::One),
    FlagSpec::new("debug", Arity::Switch),
];

#[derive(Parser, Debug)]
#[command(author, version, about = "Cut and crop a video snippet", long_about = None)]
struct Args {
    /// Source video (defaults to the configured one)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Destination video (defaults to the configured one)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Seconds to keep from the start
    #[arg(long)]
    duration: Option<f64>,

    /// Keep the full frame instead of the configured crop window
    #[arg(long)]
    nocrop: bool,

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

    let mut config = Config::load_or_default(args.config.as_deref());
    if let Some(duration) = args.duration {
        config.snippet.duration_seconds = duration;
    }
    config.validate()?;

    let snippet = config.snippet;
    let input = args.input.unwrap_or(snippet.input);
    let output = args.output.unwrap_or(snippet.output);
    let crop = if args.nocrop { None } else { snippet.crop };
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("Cannot create {}", parent.display()))?;
    }

    let report = cut_snippet(&input, &output, snippet.duration_seconds, crop, &config.video.fourcc)
        .with_context(|| format!("Cannot cut {}", input.display()))?;
    println!(
        "Wrote {} of {} frames ({}x{}) to {}",
        report.written,
        report.requested,
        report.width,
        report.height,
        output.display()
    );
    Ok(())
}

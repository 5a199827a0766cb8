//! Plot head translation from several OpenFace CSV files side by side.

use anyhow::{Context, Result};
use clap::Parser;
use mocap_pipeline::{
    cli::{init_logging, normalize_args, Arity, FlagSpec},
    config::Config,
    plot::compare_head_pose,
};
use opencv::core::Size;
use std::path::PathBuf;

const FLAGS: [FlagSpec; 4] = [
    FlagSpec::new("input", Arity::Many),
    FlagSpec::new("output", Arity::One),
    FlagSpec::new("config", Arity::One),
    FlagSpec::new("debug", Arity::Switch),
];

#[derive(Parser, Debug)]
#[command(author, version, about = "Compare head-pose translation across recordings", long_about = None)]
struct Args {
    /// OpenFace CSV files (defaults to the configured pair)
    #[arg(long, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Folder for the plot (defaults to the configured folder)
    #[arg(long)]
    output: Option<PathBuf>,

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

    let inputs = if args.input.is_empty() {
        config.plot.default_inputs.clone()
    } else {
        args.input
    };
    let output_dir = args.output.unwrap_or_else(|| config.paths.plot_output.clone());
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Cannot create {}", output_dir.display()))?;

    let cell = Size::new(config.plot.cell_width, config.plot.cell_height);
    let plot = compare_head_pose(&inputs, &output_dir, cell).context("Plotting failed")?;
    println!("Plot saved to {}", plot.display());
    Ok(())
}

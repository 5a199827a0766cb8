//! Print the y-axis rotation matrix and optionally rotate a landmark track.

use anyhow::{Context, Result};
use clap::Parser;
use mocap_pipeline::{
    cli::{init_logging, normalize_args, Arity, FlagSpec},
    rotation::{rotate_track, rotate_y, DEFAULT_THETA},
    table::{load_track, write_table},
    utils::rotated_track_path,
};
use std::{fs::File, path::PathBuf};

const FLAGS: [FlagSpec; 4] = [
    FlagSpec::new("theta", Arity::One),
    FlagSpec::new("input", Arity::One),
    FlagSpec::new("output", Arity::One),
    FlagSpec::new("debug", Arity::Switch),
];

#[derive(Parser, Debug)]
#[command(author, version, about = "Rotate landmark coordinates about the y axis", long_about = None)]
struct Args {
    /// Rotation angle in radians
    #[arg(long, default_value_t = DEFAULT_THETA, allow_negative_numbers = true)]
    theta: f64,

    /// Track CSV whose (x, y, z) triples are rotated
    #[arg(long)]
    input: Option<PathBuf>,

    /// Destination CSV (defaults to `<stem>__rotated.csv` beside the input)
    #[arg(long)]
    output: Option<PathBuf>,

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

    let rotation = rotate_y(args.theta);
    println!("Rotation matrix about y for theta = {}:{rotation}", args.theta);

    let Some(input) = args.input else {
        return Ok(());
    };
    let track = load_track(&input).with_context(|| format!("Cannot read {}", input.display()))?;
    let rotated = rotate_track(track.view(), &rotation)?;

    let output = args.output.unwrap_or_else(|| rotated_track_path(&input));
    let file = File::create(&output).with_context(|| format!("Cannot create {}", output.display()))?;
    write_table(rotated.view(), file)?;
    println!("Rotated {} rows to {}", rotated.nrows(), output.display());
    Ok(())
}

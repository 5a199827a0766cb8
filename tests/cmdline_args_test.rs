//! Tests for command-line handling of the tool binaries
//!
//! The binaries accept the single-dash flags of the recording scripts and
//! ignore flags they do not know.

mod test_helpers;

use mocap_pipeline::{
    cli::{normalize_args, Arity, FlagSpec},
    table::{load_track, write_table},
};
use ndarray::array;
use std::{fs::File, process::Command};
use test_helpers::temp_path;

fn run(bin: &str, args: &[&str]) -> std::process::Output {
    Command::new(bin).args(args).output().expect("Failed to execute command")
}

#[test]
fn test_plot_inputs_collect_until_next_flag() {
    let flags = [FlagSpec::new("input", Arity::Many), FlagSpec::new("config", Arity::One)];
    let args = normalize_args(
        ["headpose-compare", "-input", "a.csv", "b.csv", "c.csv", "-config", "cfg.yaml"],
        &flags,
    );
    assert_eq!(
        args,
        vec!["headpose-compare", "--input", "a.csv", "b.csv", "c.csv", "--config", "cfg.yaml"]
    );
}

#[test]
fn test_help_for_every_tool() {
    for bin in [
        env!("CARGO_BIN_EXE_bodypose"),
        env!("CARGO_BIN_EXE_headpose"),
        env!("CARGO_BIN_EXE_headpose-compare"),
        env!("CARGO_BIN_EXE_cut-snippet"),
        env!("CARGO_BIN_EXE_rotate-coords"),
    ] {
        let output = run(bin, &["-help"]);
        assert!(output.status.success(), "{bin} -help failed");
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("--config") || stdout.contains("--theta"), "{bin}: {stdout}");
    }
}

#[test]
fn test_rotation_matrix_is_printed() {
    let output = run(env!("CARGO_BIN_EXE_rotate-coords"), &["-theta", "0"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Rotation matrix about y"));
}

#[test]
fn test_unknown_flags_are_ignored() {
    let output = run(env!("CARGO_BIN_EXE_rotate-coords"), &["-fps", "30", "-theta", "-0.5", "--bogus"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn test_rotate_track_file() {
    let input = temp_path("rotate_input.csv");
    let output = temp_path("rotate_output.csv");
    write_table(array![[1.0, 2.0, 3.0, 0.0, 0.0, 1.0]].view(), File::create(&input).unwrap()).unwrap();

    let result = run(
        env!("CARGO_BIN_EXE_rotate-coords"),
        &[
            "-theta",
            "0",
            "-input",
            input.to_str().unwrap(),
            "-output",
            output.to_str().unwrap(),
        ],
    );
    assert!(result.status.success(), "stderr: {}", String::from_utf8_lossy(&result.stderr));

    let rotated = load_track(&output).unwrap();
    assert_eq!(rotated, array![[1.0, 2.0, 3.0, 0.0, 0.0, 1.0]]);
}

#[test]
fn test_missing_video_is_reported() {
    let output = run(env!("CARGO_BIN_EXE_bodypose"), &["-input", "nonexistent_clip.avi"]);
    assert!(!output.status.success(), "Expected failure for nonexistent video file");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to open video"), "stderr: {stderr}");
}

#[test]
fn test_bad_plot_input_is_reported() {
    let csv = temp_path("not_openface.csv");
    std::fs::write(&csv, "frame,timestamp\n1,0.0\n").unwrap();
    let out_dir = temp_path("plots");
    let output = run(
        env!("CARGO_BIN_EXE_headpose-compare"),
        &["-input", csv.to_str().unwrap(), "-output", out_dir.to_str().unwrap()],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing column"), "stderr: {stderr}");
}

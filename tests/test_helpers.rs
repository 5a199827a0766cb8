//! Helper functions and utilities for tests

#![allow(dead_code)]

use mocap_pipeline::{
    landmarks::{Landmark, LandmarkLayout, LandmarkSet},
    track::{FrameRead, FrameSource, LandmarkDetector},
    Result,
};
use opencv::{core::Mat, prelude::*};
use std::{collections::VecDeque, path::PathBuf};

/// Create a test image with specified dimensions and type
pub fn create_test_image(height: i32, width: i32, cv_type: i32) -> Result<Mat> {
    Mat::zeros(height, width, cv_type)?.to_mat().map_err(Into::into)
}

/// One scripted read: `Some(v)` decodes to pixel value `v`, `None` fails to decode
pub type Script = Vec<Option<u32>>;

/// Frame source replaying a script, then ending
pub struct ScriptedSource {
    declared: usize,
    frames: VecDeque<Option<u32>>,
}

impl ScriptedSource {
    /// Declares exactly as many frames as the script holds
    pub fn new(script: Script) -> Self {
        Self::with_declared(script.len(), script)
    }

    pub fn with_declared(declared: usize, script: Script) -> Self {
        Self {
            declared,
            frames: script.into(),
        }
    }
}

impl FrameSource for ScriptedSource {
    type Pixels = u32;

    fn declared_frame_count(&self) -> usize {
        self.declared
    }

    fn read_next(&mut self) -> FrameRead<u32> {
        match self.frames.pop_front() {
            Some(Some(pixels)) => FrameRead::Frame(pixels),
            Some(None) => FrameRead::DecodeFailure,
            None => FrameRead::EndOfStream,
        }
    }
}

/// Detector for `u32` frames: 0 means no subject, any other value `v`
/// gives a set whose landmark `i` is `(v, i, -v)`
pub struct ValueDetector {
    pub layout: LandmarkLayout,
}

impl ValueDetector {
    pub fn new(layout: LandmarkLayout) -> Self {
        Self { layout }
    }
}

/// The set `ValueDetector` returns for pixel value `v`
#[allow(clippy::cast_precision_loss)]
pub fn value_set(layout: &LandmarkLayout, v: u32) -> LandmarkSet {
    let v = v as f32;
    LandmarkSet::new(
        (0..layout.source_points)
            .map(|i| Landmark::new(v, i as f32, -v))
            .collect(),
    )
}

impl LandmarkDetector<u32> for ValueDetector {
    fn layout(&self) -> LandmarkLayout {
        self.layout
    }

    fn detect(&mut self, pixels: &u32) -> Result<Option<LandmarkSet>> {
        Ok((*pixels != 0).then(|| value_set(&self.layout, *pixels)))
    }
}

/// Fresh path under the system temp folder, unique per test name and process
pub fn temp_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mocap_pipeline_tests_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

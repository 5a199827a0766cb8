//! Cut the first seconds of a recording, optionally cropped.

use crate::{
    video::{output_fps, VideoFileSink, VideoFileSource, VideoSink},
    Error, Result,
};
use log::{info, warn};
use opencv::{
    core::{Mat, Rect},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Inclusive-exclusive pixel window `[min_x, max_x) × [min_y, max_y)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropWindow {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Default for CropWindow {
    fn default() -> Self {
        Self {
            min_x: 550,
            max_x: 1300,
            min_y: 400,
            max_y: 1000,
        }
    }
}

impl CropWindow {
    /// Intersect the window with a `width × height` frame.
    ///
    /// Returns `None` when nothing of the window lies inside the frame.
    #[must_use]
    pub fn clamp_to(&self, width: i32, height: i32) -> Option<Rect> {
        let x0 = self.min_x.clamp(0, width);
        let x1 = self.max_x.clamp(0, width);
        let y0 = self.min_y.clamp(0, height);
        let y1 = self.max_y.clamp(0, height);
        (x1 > x0 && y1 > y0).then(|| Rect::new(x0, y0, x1 - x0, y1 - y0))
    }
}

/// Number of frames in the first `duration_seconds` at `fps`, truncated
#[must_use]
pub fn frames_to_extract(fps: f64, duration_seconds: f64) -> usize {
    let frames = fps * duration_seconds;
    if frames.is_finite() && frames > 0.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let frames = frames as usize;
        frames
    } else {
        0
    }
}

/// Outcome of a snippet run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnippetReport {
    /// Frames the duration asked for
    pub requested: usize,
    /// Frames actually written
    pub written: usize,
    /// Output frame size
    pub width: i32,
    pub height: i32,
}

/// Copy the first `duration_seconds` of `input` to `output`.
///
/// Frames are cropped to `crop` clamped to the frame size; a window that
/// misses the frame entirely keeps the full frame. Stops early when the
/// input runs out.
///
/// # Errors
///
/// Returns `Error::VideoOpen` if the input cannot be opened,
/// `Error::InvalidInput` if the duration covers no whole frame, or an error
/// if the output cannot be written
pub fn cut_snippet(
    input: &Path,
    output: &Path,
    duration_seconds: f64,
    crop: Option<CropWindow>,
    codec: &str,
) -> Result<SnippetReport> {
    let mut source = VideoFileSource::open(input)?;
    let info = *source.info();

    let fps = output_fps(info.fps);
    let requested = frames_to_extract(fps, duration_seconds);
    if requested == 0 {
        return Err(Error::InvalidInput(format!(
            "{duration_seconds} s at {fps:.2} fps is less than one frame"
        )));
    }
    let roi = match crop {
        Some(window) => {
            let roi = window.clamp_to(info.width, info.height);
            if roi.is_none() {
                warn!("Crop window {window:?} lies outside the {}x{} frame, keeping full frame", info.width, info.height);
            }
            roi
        }
        None => None,
    };
    let out_rect = roi.unwrap_or_else(|| Rect::new(0, 0, info.width, info.height));
    info!(
        "Cutting {requested} frames ({duration_seconds} s at {:.2} fps), region {}x{}+{}+{}",
        fps, out_rect.width, out_rect.height, out_rect.x, out_rect.y
    );

    let mut sink = VideoFileSink::create(output, codec, fps, out_rect.size())?;
    let written = copy_frames(&mut source, &mut sink, requested, roi);
    sink.close()?;
    let written = written?;

    if written < requested {
        warn!("Input ended after {written} of {requested} frames");
    }
    info!("Snippet saved to {}", output.display());

    Ok(SnippetReport {
        requested,
        written,
        width: out_rect.width,
        height: out_rect.height,
    })
}

fn copy_frames<S: VideoSink<Mat>>(
    source: &mut VideoFileSource,
    sink: &mut S,
    requested: usize,
    roi: Option<Rect>,
) -> Result<usize> {
    for _ in 0..requested {
        let Some(frame) = source.read_frame()? else {
            break;
        };
        match roi {
            Some(rect) => {
                let cropped = Mat::roi(&frame, rect)?.try_clone()?;
                sink.write_frame(&cropped)?;
            }
            None => sink.write_frame(&frame)?,
        }
    }
    Ok(sink.frames_written())
}

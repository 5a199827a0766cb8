//! Video input and output on top of `OpenCV` `videoio`.

use crate::{
    track::{FrameRead, FrameSource},
    utils::safe_cast::f64_to_i32,
    Error, Result,
};
use log::{info, warn};
use opencv::{
    core::{Mat, Size},
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use std::path::{Path, PathBuf};

/// Frame rate used when the container does not report one
pub const FALLBACK_FPS: f64 = 30.0;

/// Frame rate for output video, `FALLBACK_FPS` when the source reports none
#[must_use]
pub fn output_fps(fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 {
        fps
    } else {
        warn!("Source reports {fps} fps, using {FALLBACK_FPS}");
        FALLBACK_FPS
    }
}

/// Container properties read when a video is opened
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    /// Frame count declared by the container, 0 if unknown
    pub frame_count: usize,
    pub fps: f64,
    pub width: i32,
    pub height: i32,
}

impl VideoInfo {
    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Frames decoded from a video file or camera
pub struct VideoFileSource {
    capture: VideoCapture,
    info: VideoInfo,
    label: String,
}

impl VideoFileSource {
    /// Open a video file
    ///
    /// # Errors
    ///
    /// Returns `Error::VideoOpen` if the file cannot be opened
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening video file: {}", path.display());
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::InvalidInput(format!("Non UTF-8 video path: {}", path.display())))?;
        let capture = VideoCapture::from_file(path_str, videoio::CAP_ANY)?;
        Self::from_capture(capture, path.display().to_string())
    }

    /// Open a camera by index
    ///
    /// # Errors
    ///
    /// Returns `Error::VideoOpen` if the camera cannot be opened
    pub fn camera(index: i32) -> Result<Self> {
        info!("Opening camera {index}");
        let capture = VideoCapture::new(index, videoio::CAP_ANY)?;
        Self::from_capture(capture, format!("camera {index}"))
    }

    fn from_capture(capture: VideoCapture, label: String) -> Result<Self> {
        if !capture.is_opened()? {
            return Err(Error::VideoOpen(label));
        }
        let declared = capture.get(videoio::CAP_PROP_FRAME_COUNT)?;
        // Cameras and some containers report 0 or a negative count
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let frame_count = if declared.is_finite() && declared > 0.0 { declared as usize } else { 0 };
        let info = VideoInfo {
            frame_count,
            fps: capture.get(videoio::CAP_PROP_FPS)?,
            width: f64_to_i32(capture.get(videoio::CAP_PROP_FRAME_WIDTH)?)?,
            height: f64_to_i32(capture.get(videoio::CAP_PROP_FRAME_HEIGHT)?)?,
        };
        info!(
            "{label}: {}x{} @ {:.2} fps, {} frames",
            info.width, info.height, info.fps, info.frame_count
        );
        Ok(Self { capture, info, label })
    }

    #[must_use]
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Read one frame; `None` when nothing could be decoded
    ///
    /// # Errors
    ///
    /// Returns an error if the capture backend fails
    pub fn read_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if self.capture.read(&mut frame)? && !frame.empty() {
            Ok(Some(frame))
        } else {
            Ok(None)
        }
    }

    /// Decoder cursor in frames, `None` when the backend does not report one
    fn position(&self) -> Option<f64> {
        self.capture
            .get(videoio::CAP_PROP_POS_FRAMES)
            .ok()
            .filter(|pos| pos.is_finite() && *pos >= 0.0)
    }

    /// A failed read that moved the cursor skipped a damaged frame; one that
    /// left it in place hit the end of the decodable data
    fn classify_failure(&self, before: Option<f64>) -> FrameRead<Mat> {
        if cursor_advanced(before, self.position()) {
            FrameRead::DecodeFailure
        } else {
            info!(
                "{}: no decodable frames after position {}",
                self.label,
                before.unwrap_or_default()
            );
            FrameRead::EndOfStream
        }
    }
}

impl FrameSource for VideoFileSource {
    type Pixels = Mat;

    fn declared_frame_count(&self) -> usize {
        self.info.frame_count
    }

    fn read_next(&mut self) -> FrameRead<Mat> {
        let before = self.position();
        match self.read_frame() {
            Ok(Some(frame)) => FrameRead::Frame(frame),
            Ok(None) => self.classify_failure(before),
            Err(e) => {
                warn!("Failed to read frame from {}: {e}", self.label);
                self.classify_failure(before)
            }
        }
    }
}

/// True when a read moved the decoder cursor forward
fn cursor_advanced(before: Option<f64>, after: Option<f64>) -> bool {
    matches!((before, after), (Some(before), Some(after)) if after > before)
}

/// Consumer of annotated frames, in frame order
pub trait VideoSink<P> {
    /// Append one frame
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be encoded
    fn write_frame(&mut self, frame: &P) -> Result<()>;

    /// Flush and close; further writes are errors
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be finalised
    fn close(&mut self) -> Result<()>;

    fn frames_written(&self) -> usize;
}

/// Convert a four character code such as `mp4v`
///
/// # Errors
///
/// Returns an error if `code` is not exactly four characters
pub fn fourcc(code: &str) -> Result<i32> {
    let chars: Vec<char> = code.chars().collect();
    match chars.as_slice() {
        [a, b, c, d] => Ok(VideoWriter::fourcc(*a, *b, *c, *d)?),
        _ => Err(Error::InvalidInput(format!("Codec code must have four characters: {code:?}"))),
    }
}

/// Encoded video file written through `OpenCV`
pub struct VideoFileSink {
    writer: VideoWriter,
    path: PathBuf,
    frames: usize,
    closed: bool,
}

impl VideoFileSink {
    /// Create the output file
    ///
    /// # Errors
    ///
    /// Returns an error if the codec is unknown or the file cannot be created
    pub fn create<P: AsRef<Path>>(path: P, codec: &str, fps: f64, size: Size) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::InvalidInput(format!("Non UTF-8 output path: {}", path.display())))?;
        let writer = VideoWriter::new(path_str, fourcc(codec)?, fps, size, true)?;
        if !writer.is_opened()? {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("cannot create video {}", path.display()),
            )));
        }
        info!("Writing output to: {}", path.display());
        Ok(Self {
            writer,
            path,
            frames: 0,
            closed: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VideoSink<Mat> for VideoFileSink {
    fn write_frame(&mut self, frame: &Mat) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidInput(format!("{} is already closed", self.path.display())));
        }
        self.writer.write(frame)?;
        self.frames += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.writer.release()?;
            self.closed = true;
            info!("Saved processed video to {} ({} frames)", self.path.display(), self.frames);
        }
        Ok(())
    }

    fn frames_written(&self) -> usize {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_rejects_wrong_length() {
        assert!(fourcc("mp4").is_err());
        assert!(fourcc("mp4vv").is_err());
        assert!(fourcc("").is_err());
    }

    #[test]
    fn test_fourcc_packs_little_endian() {
        let code = fourcc("mp4v").unwrap();
        let expected = i32::from_le_bytes([b'm', b'p', b'4', b'v']);
        assert_eq!(code, expected);
    }

    #[test]
    fn test_output_fps_fallback() {
        assert!((output_fps(25.0) - 25.0).abs() < f64::EPSILON);
        assert!((output_fps(0.0) - FALLBACK_FPS).abs() < f64::EPSILON);
        assert!((output_fps(f64::NAN) - FALLBACK_FPS).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cursor_advanced() {
        assert!(cursor_advanced(Some(4.0), Some(5.0)));
        assert!(!cursor_advanced(Some(6.0), Some(6.0)));
        assert!(!cursor_advanced(None, Some(1.0)));
        assert!(!cursor_advanced(Some(1.0), None));
    }

    #[test]
    fn test_open_missing_file_fails() {
        let result = VideoFileSource::open("definitely/not/here.avi");
        assert!(result.is_err());
    }
}

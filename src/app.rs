//! Tracking runs for the body-pose and head-pose tools.
//!
//! Both tools share one loop: frames go through [`TrackBuilder`], fresh
//! detections are drawn on the frame, every decoded frame is written to the
//! output video and, optionally, shown in a preview window. The video is
//! closed and the track saved even when the run is cancelled from the
//! preview.

use crate::{
    body_pose::{draw_pose, BodyPoseDetector},
    config::Config,
    constants::{KEY_ESCAPE, KEY_QUIT},
    face_detection::FaceDetector,
    head_pose::{pnp_points, FaceLandmarkDetector, HeadPoseEstimator},
    landmarks::LandmarkSet,
    mark_detection::MarkDetector,
    table::save_track,
    track::{Frame, FrameControl, FrameObserver, FrameRead, FrameSource, LandmarkDetector, TrackBuilder, TrackRow, TrackSummary},
    utils::{body_pose_outputs, head_pose_outputs, OutputPaths},
    video::{output_fps, VideoFileSink, VideoFileSource, VideoSink},
    Error, Result,
};
use log::{info, warn};
use opencv::{
    core::{Mat, Size},
    highgui::{self, WINDOW_AUTOSIZE},
    imgproc::{self, INTER_AREA},
    prelude::*,
};
use std::path::{Path, PathBuf};

/// What a finished run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outputs: OutputPaths,
    pub summary: TrackSummary,
    pub frames_written: usize,
}

/// Preview size for a display scale in percent, never smaller than 1×1
#[must_use]
pub fn scaled_size(size: Size, scale_percent: u32) -> Size {
    let scale = |v: i32| {
        let scaled = i64::from(v) * i64::from(scale_percent) / 100;
        i32::try_from(scaled).unwrap_or(i32::MAX).max(1)
    };
    Size::new(scale(size.width), scale(size.height))
}

/// Whether a key code from `wait_key` stops the run
#[must_use]
pub fn is_stop_key(key: i32) -> bool {
    // Some backends set modifier bits above the low byte
    let key = if key < 0 { key } else { key & 0xFF };
    key == KEY_ESCAPE || key == KEY_QUIT
}

/// Scaled preview window with a per-frame key check
pub struct PreviewWindow {
    name: String,
    scale_percent: u32,
    wait_ms: i32,
}

impl PreviewWindow {
    /// Open the window
    ///
    /// # Errors
    ///
    /// Returns an error if the GUI backend cannot create the window
    pub fn new(name: &str, scale_percent: u32, wait_ms: i32) -> Result<Self> {
        highgui::named_window(name, WINDOW_AUTOSIZE)?;
        Ok(Self {
            name: name.to_string(),
            scale_percent,
            wait_ms,
        })
    }

    /// Show one frame and poll the keyboard
    ///
    /// # Errors
    ///
    /// Returns an error if resizing or the GUI call fails
    pub fn show(&self, frame: &Mat) -> Result<FrameControl> {
        let mut resized = Mat::default();
        let size = scaled_size(Size::new(frame.cols(), frame.rows()), self.scale_percent);
        imgproc::resize(frame, &mut resized, size, 0.0, 0.0, INTER_AREA)?;
        highgui::imshow(&self.name, &resized)?;

        if is_stop_key(highgui::wait_key(self.wait_ms)?) {
            info!("Stopped from the preview window");
            return Ok(FrameControl::Stop);
        }
        Ok(FrameControl::Continue)
    }
}

/// Shows annotated frames and decides whether the run goes on
pub trait FramePreview {
    /// # Errors
    ///
    /// Returns an error if the frame cannot be shown
    fn show(&mut self, frame: &Mat) -> Result<FrameControl>;
}

impl FramePreview for PreviewWindow {
    fn show(&mut self, frame: &Mat) -> Result<FrameControl> {
        PreviewWindow::show(self, frame)
    }
}

impl Drop for PreviewWindow {
    fn drop(&mut self) {
        if let Err(e) = highgui::destroy_window(&self.name) {
            warn!("Failed to close preview window: {e}");
        }
    }
}

/// Replays an already decoded first frame before reading on
pub struct PrimedSource<S: FrameSource> {
    first: Option<S::Pixels>,
    inner: S,
}

impl<S: FrameSource> PrimedSource<S> {
    pub fn new(first: S::Pixels, inner: S) -> Self {
        Self {
            first: Some(first),
            inner,
        }
    }
}

impl<S: FrameSource> FrameSource for PrimedSource<S> {
    type Pixels = S::Pixels;

    fn declared_frame_count(&self) -> usize {
        self.inner.declared_frame_count()
    }

    fn read_next(&mut self) -> FrameRead<S::Pixels> {
        match self.first.take() {
            Some(pixels) => FrameRead::Frame(pixels),
            None => self.inner.read_next(),
        }
    }
}

/// Draws fresh detections, writes every decoded frame and drives the preview
struct AnnotatingObserver<'a, A, P> {
    annotate: A,
    sink: &'a mut dyn VideoSink<Mat>,
    preview: Option<P>,
}

impl<A, P> FrameObserver<Mat> for AnnotatingObserver<'_, A, P>
where
    A: FnMut(&mut Mat, &LandmarkSet) -> Result<()>,
    P: FramePreview,
{
    fn on_frame(&mut self, frame: &mut Frame<Mat>, detection: Option<&LandmarkSet>, _row: &TrackRow) -> Result<FrameControl> {
        if let Some(set) = detection {
            (self.annotate)(&mut frame.pixels, set)?;
        }
        self.sink.write_frame(&frame.pixels)?;
        match &mut self.preview {
            Some(preview) => preview.show(&frame.pixels),
            None => Ok(FrameControl::Continue),
        }
    }
}

/// Run the tracking loop, then close the video and save the track
fn run_tracking<S, D, A, P>(
    source: &mut S,
    detector: &mut D,
    sink: &mut dyn VideoSink<Mat>,
    preview: Option<P>,
    annotate: A,
    outputs: OutputPaths,
) -> Result<RunReport>
where
    S: FrameSource<Pixels = Mat>,
    D: LandmarkDetector<Mat>,
    A: FnMut(&mut Mat, &LandmarkSet) -> Result<()>,
    P: FramePreview,
{
    let layout = detector.layout();
    let mut observer = AnnotatingObserver {
        annotate,
        sink: &mut *sink,
        preview,
    };
    let tracked = TrackBuilder::new(layout).process(source, detector, &mut observer);
    drop(observer);

    let closed = sink.close();
    let matrix = tracked?;
    closed?;
    save_track(&outputs.track, &matrix)?;

    Ok(RunReport {
        outputs,
        summary: matrix.summary(),
        frames_written: sink.frames_written(),
    })
}

fn create_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// Body-pose landmark extraction over one video
pub struct BodyPoseApp {
    config: Config,
    input: PathBuf,
    display: bool,
}

impl BodyPoseApp {
    /// `input` defaults to the configured sample video
    #[must_use]
    pub fn new(config: Config, input: Option<PathBuf>, display: bool) -> Self {
        let input = input.unwrap_or_else(|| config.paths.default_body_video.clone());
        Self { config, input, display }
    }

    #[must_use]
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Process the whole video
    ///
    /// # Errors
    ///
    /// Returns an error if the video cannot be opened, the model cannot be
    /// loaded or an output cannot be written
    pub fn run(&self) -> Result<RunReport> {
        info!("Starting body pose extraction on {}", self.input.display());
        let mut source = VideoFileSource::open(&self.input)?;
        let video = *source.info();

        let output_dir = &self.config.paths.body_pose_output;
        create_output_dir(output_dir)?;
        let outputs = body_pose_outputs(&self.input, output_dir);

        let mut detector = BodyPoseDetector::new(&self.config.body_pose)?;
        let mut sink = VideoFileSink::create(&outputs.video, &self.config.video.fourcc, output_fps(video.fps), video.size())?;
        let preview = if self.display {
            Some(PreviewWindow::new("Body Pose", self.config.display.scale_percent, self.config.display.wait_ms)?)
        } else {
            None
        };

        run_tracking(&mut source, &mut detector, &mut sink, preview, draw_pose, outputs)
    }
}

/// Where the head-pose tool reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadPoseInput {
    File(PathBuf),
    Camera(i32),
}

impl HeadPoseInput {
    /// A missing file falls back to `default_video`; no input means webcam 0
    #[must_use]
    pub fn select(requested: Option<&Path>, default_video: &Path) -> Self {
        match requested {
            Some(path) if path.is_file() => Self::File(path.to_path_buf()),
            Some(path) => {
                warn!(
                    "{} does not exist, using {}",
                    path.display(),
                    default_video.display()
                );
                Self::File(default_video.to_path_buf())
            }
            None => Self::Camera(0),
        }
    }
}

/// Head orientation from facial landmarks over a video or webcam stream
pub struct HeadPoseApp {
    config: Config,
    input: HeadPoseInput,
    display: bool,
}

impl HeadPoseApp {
    #[must_use]
    pub fn new(config: Config, input: Option<PathBuf>, display: bool) -> Self {
        let input = HeadPoseInput::select(input.as_deref(), &config.paths.default_head_video);
        Self { config, input, display }
    }

    #[must_use]
    pub fn input(&self) -> &HeadPoseInput {
        &self.input
    }

    /// Open the input. A webcam that cannot be opened falls back to the
    /// default video. Returns the source and the path outputs are named after.
    fn open_source(&self) -> Result<(VideoFileSource, PathBuf)> {
        match &self.input {
            HeadPoseInput::File(path) => Ok((VideoFileSource::open(path)?, path.clone())),
            HeadPoseInput::Camera(index) => match VideoFileSource::camera(*index) {
                Ok(source) => Ok((source, PathBuf::from("webcam.avi"))),
                Err(e) => {
                    let fallback = &self.config.paths.default_head_video;
                    warn!("Camera {index} unavailable ({e}), using {}", fallback.display());
                    Ok((VideoFileSource::open(fallback)?, fallback.clone()))
                }
            },
        }
    }

    /// Process the whole stream
    ///
    /// # Errors
    ///
    /// Returns an error if no input can be opened, the first frame cannot be
    /// read, a model cannot be loaded or an output cannot be written
    pub fn run(&self) -> Result<RunReport> {
        let (mut source, named_after) = self.open_source()?;
        let first = source
            .read_frame()?
            .ok_or_else(|| Error::VideoOpen(format!("{}: cannot read the first frame", source.label())))?;
        let frame_size = Size::new(first.cols(), first.rows());
        let fps = output_fps(source.info().fps);

        let estimator = HeadPoseEstimator::new(frame_size.width, frame_size.height)?;
        let head_pose = &self.config.head_pose;
        let face_detector = FaceDetector::new(
            &head_pose.face_detector_config,
            &head_pose.face_detector_weights,
            head_pose.face_confidence,
        )?;
        let mark_detector = MarkDetector::new(&head_pose.landmark_model)?;
        let mut detector = FaceLandmarkDetector::new(face_detector, mark_detector, head_pose.box_shift);

        let output_dir = &self.config.paths.head_pose_output;
        create_output_dir(output_dir)?;
        let outputs = head_pose_outputs(&named_after, output_dir);
        let mut sink = VideoFileSink::create(&outputs.video, &self.config.video.fourcc, fps, frame_size)?;
        let preview = if self.display {
            Some(PreviewWindow::new("Head Pose", self.config.display.scale_percent, self.config.display.wait_ms)?)
        } else {
            None
        };

        let threshold = head_pose.turn_threshold_deg;
        let annotate = |image: &mut Mat, set: &LandmarkSet| -> Result<()> {
            let points = pnp_points(set)?;
            match estimator.analyze(&points, threshold) {
                Ok(reading) => {
                    for direction in reading.vertical.iter().chain(&reading.horizontal) {
                        info!("{direction}");
                    }
                    reading.draw(image)
                }
                Err(e) => {
                    warn!("Head pose estimation failed: {e}");
                    Ok(())
                }
            }
        };

        let mut source = PrimedSource::new(first, source);
        run_tracking(&mut source, &mut detector, &mut sink, preview, annotate, outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Landmark, LandmarkLayout, BODY_POSE};
    use opencv::core::{Scalar, CV_8UC3};
    use std::collections::VecDeque;

    struct Numbers {
        declared: usize,
        frames: VecDeque<u8>,
    }

    impl FrameSource for Numbers {
        type Pixels = u8;

        fn declared_frame_count(&self) -> usize {
            self.declared
        }

        fn read_next(&mut self) -> FrameRead<u8> {
            self.frames.pop_front().map_or(FrameRead::EndOfStream, FrameRead::Frame)
        }
    }

    /// Blank frames, all declared up front
    struct BlankFrames {
        declared: usize,
        remaining: usize,
    }

    impl FrameSource for BlankFrames {
        type Pixels = Mat;

        fn declared_frame_count(&self) -> usize {
            self.declared
        }

        fn read_next(&mut self) -> FrameRead<Mat> {
            if self.remaining == 0 {
                return FrameRead::EndOfStream;
            }
            self.remaining -= 1;
            match Mat::new_rows_cols_with_default(4, 4, CV_8UC3, Scalar::all(0.0)) {
                Ok(frame) => FrameRead::Frame(frame),
                Err(_) => FrameRead::DecodeFailure,
            }
        }
    }

    /// Finds a body on every frame
    struct AlwaysBody;

    impl LandmarkDetector<Mat> for AlwaysBody {
        fn layout(&self) -> LandmarkLayout {
            BODY_POSE
        }

        fn detect(&mut self, _frame: &Mat) -> Result<Option<LandmarkSet>> {
            Ok(Some(LandmarkSet::new(vec![Landmark::new(0.5, 0.5, 0.0); 33])))
        }
    }

    #[derive(Default)]
    struct MemorySink {
        frames: usize,
        closed: bool,
    }

    impl VideoSink<Mat> for MemorySink {
        fn write_frame(&mut self, _frame: &Mat) -> Result<()> {
            assert!(!self.closed, "write after close");
            self.frames += 1;
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }

        fn frames_written(&self) -> usize {
            self.frames
        }
    }

    /// Presses the quit key on the `stop_at`-th frame
    struct QuitAfter {
        shown: usize,
        stop_at: usize,
    }

    impl FramePreview for QuitAfter {
        fn show(&mut self, _frame: &Mat) -> Result<FrameControl> {
            self.shown += 1;
            Ok(if self.shown == self.stop_at { FrameControl::Stop } else { FrameControl::Continue })
        }
    }

    fn outputs_in_temp(name: &str) -> OutputPaths {
        let dir = std::env::temp_dir().join(format!("mocap_pipeline_app_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let outputs = OutputPaths {
            video: dir.join(format!("{name}.avi")),
            track: dir.join(format!("{name}.csv")),
        };
        let _ = std::fs::remove_file(&outputs.track);
        outputs
    }

    #[test]
    fn test_cancelled_run_closes_video_and_saves_partial_track() {
        let mut source = BlankFrames {
            declared: 10,
            remaining: 10,
        };
        let mut sink = MemorySink::default();
        let preview = QuitAfter { shown: 0, stop_at: 4 };
        let mut annotated = 0;
        let annotate = |_: &mut Mat, _: &LandmarkSet| -> Result<()> {
            annotated += 1;
            Ok(())
        };
        let outputs = outputs_in_temp("cancelled");

        let report = run_tracking(&mut source, &mut AlwaysBody, &mut sink, Some(preview), annotate, outputs.clone()).unwrap();

        assert!(sink.closed);
        assert_eq!(report.frames_written, 4);
        assert_eq!(report.summary.total(), 4);
        assert_eq!(annotated, 4);
        assert_eq!(source.remaining, 6);

        let saved = std::fs::read_to_string(&outputs.track).unwrap();
        assert_eq!(saved.lines().count(), 4);
        assert!(saved.lines().all(|line| line.split(',').count() == 99));
    }

    #[test]
    fn test_failed_run_still_closes_video() {
        let mut source = BlankFrames {
            declared: 3,
            remaining: 3,
        };
        let mut sink = MemorySink::default();
        let annotate = |_: &mut Mat, _: &LandmarkSet| -> Result<()> { Err(Error::InvalidInput("draw failed".into())) };
        let outputs = outputs_in_temp("failed");

        let result = run_tracking(&mut source, &mut AlwaysBody, &mut sink, None::<QuitAfter>, annotate, outputs.clone());

        assert!(result.is_err());
        assert!(sink.closed);
        assert!(!outputs.track.exists());
    }

    #[test]
    fn test_primed_source_replays_first_frame() {
        let inner = Numbers {
            declared: 3,
            frames: vec![2, 3].into(),
        };
        let mut source = PrimedSource::new(1, inner);
        assert_eq!(source.declared_frame_count(), 3);

        let mut seen = Vec::new();
        while let FrameRead::Frame(pixels) = source.read_next() {
            seen.push(pixels);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_scaled_size() {
        assert_eq!(scaled_size(Size::new(1920, 1080), 45), Size::new(864, 486));
        assert_eq!(scaled_size(Size::new(640, 480), 100), Size::new(640, 480));
        assert_eq!(scaled_size(Size::new(1, 1), 10), Size::new(1, 1));
    }

    #[test]
    fn test_stop_keys() {
        assert!(is_stop_key(27));
        assert!(is_stop_key(i32::from(b'q')));
        assert!(is_stop_key(0x100 | i32::from(b'q')));
        assert!(!is_stop_key(-1));
        assert!(!is_stop_key(i32::from(b'a')));
    }

    #[test]
    fn test_head_pose_input_selection() {
        let default_video = Path::new("default.avi");
        assert_eq!(HeadPoseInput::select(None, default_video), HeadPoseInput::Camera(0));
        assert_eq!(
            HeadPoseInput::select(Some(Path::new("no/such/clip.mp4")), default_video),
            HeadPoseInput::File(default_video.to_path_buf())
        );
        assert_eq!(
            HeadPoseInput::select(Some(Path::new("Cargo.toml")), default_video),
            HeadPoseInput::File(PathBuf::from("Cargo.toml"))
        );
    }

    #[test]
    fn test_body_pose_app_defaults_to_sample_video() {
        let config = Config::default();
        let expected = config.paths.default_body_video.clone();
        let app = BodyPoseApp::new(config, None, false);
        assert_eq!(app.input(), expected.as_path());
    }

    #[test]
    fn test_missing_video_is_fatal() {
        let app = BodyPoseApp::new(Config::default(), Some(PathBuf::from("no/such/video.avi")), false);
        assert!(app.run().is_err());
    }
}

//! Configuration management for the pipeline tools

use crate::{
    constants::{
        DEFAULT_DETECTION_CONFIDENCE, DEFAULT_DISPLAY_SCALE_PERCENT, DEFAULT_FACE_CONFIDENCE, DEFAULT_FOURCC,
        DEFAULT_SNIPPET_SECONDS, DEFAULT_TRACKING_CONFIDENCE, HEAD_TURN_THRESHOLD_DEG,
    },
    snippet::CropWindow,
    utils::image_conversion::TensorLayout,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Pipeline configuration shared by all tools
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input and output locations
    pub paths: PathConfig,

    /// Body-pose model configuration
    pub body_pose: BodyPoseConfig,

    /// Head-pose models and thresholds
    pub head_pose: HeadPoseConfig,

    /// Interactive preview
    pub display: DisplayConfig,

    /// Output video encoding
    pub video: VideoConfig,

    /// Clip cutting
    pub snippet: SnippetConfig,

    /// Head-pose comparison plot
    pub plot: PlotConfig,
}

/// Input and output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Video used by the body-pose tool when no input is given
    pub default_body_video: PathBuf,

    /// Video used by the head-pose tool when the input is missing
    pub default_head_video: PathBuf,

    /// Folder for body-pose videos and tracks
    pub body_pose_output: PathBuf,

    /// Folder for head-pose videos and tracks
    pub head_pose_output: PathBuf,

    /// Folder for comparison plots
    pub plot_output: PathBuf,
}

/// Body-pose model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyPoseConfig {
    /// Path to the pose landmark ONNX model
    pub model: PathBuf,

    /// Square input size of the model
    pub input_size: i32,

    /// Input tensor layout, `nhwc` or `nchw`
    pub input_layout: TensorLayout,

    /// Minimum pose presence score (0.0-1.0)
    pub min_detection_confidence: f32,

    /// Minimum mean landmark visibility (0.0-1.0)
    pub min_tracking_confidence: f32,
}

/// Head-pose models and thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadPoseConfig {
    /// Caffe prototxt of the SSD face detector
    pub face_detector_config: PathBuf,

    /// Caffe weights of the SSD face detector
    pub face_detector_weights: PathBuf,

    /// Minimum face detection confidence (0.0-1.0)
    pub face_confidence: f32,

    /// Path to the 68-point facial landmark ONNX model
    pub landmark_model: PathBuf,

    /// Face box expansion before landmark detection
    pub box_shift: f32,

    /// Angle in degrees at which a head turn is reported
    pub turn_threshold_deg: i32,
}

/// Interactive preview
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Preview size as a percentage of the frame
    pub scale_percent: u32,

    /// Key wait per frame in milliseconds
    pub wait_ms: i32,
}

/// Output video encoding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Four character codec code
    pub fourcc: String,
}

/// Clip cutting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetConfig {
    /// Source video
    pub input: PathBuf,

    /// Destination video
    pub output: PathBuf,

    /// Length of the clip from the start, seconds
    pub duration_seconds: f64,

    /// Crop window, `None` keeps the full frame
    pub crop: Option<CropWindow>,
}

/// Head-pose comparison plot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// CSV files compared when none are given
    pub default_inputs: Vec<PathBuf>,

    /// Width of one chart in pixels
    pub cell_width: i32,

    /// Height of one chart in pixels
    pub cell_height: i32,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            default_body_video: PathBuf::from("data/data_raw/videos/webcam/test_distance_webcam.avi"),
            default_head_video: PathBuf::from("data/data_raw/videos/test_1min_1p.avi"),
            body_pose_output: PathBuf::from("data/data_processed/videos/mediapipe"),
            head_pose_output: PathBuf::from("data/data_processed/videos/opencv_dlib_custom"),
            plot_output: PathBuf::from("data/data_processed/videos/OpenFace"),
        }
    }
}

impl Default for BodyPoseConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("models/pose_landmark_full.onnx"),
            input_size: 256,
            input_layout: TensorLayout::Nhwc,
            min_detection_confidence: DEFAULT_DETECTION_CONFIDENCE,
            min_tracking_confidence: DEFAULT_TRACKING_CONFIDENCE,
        }
    }
}

impl Default for HeadPoseConfig {
    fn default() -> Self {
        Self {
            face_detector_config: PathBuf::from("models/deploy.prototxt.txt"),
            face_detector_weights: PathBuf::from("models/res10_300x300_ssd_iter_140000.caffemodel"),
            face_confidence: DEFAULT_FACE_CONFIDENCE,
            landmark_model: PathBuf::from("models/face_landmarks.onnx"),
            box_shift: 0.1,
            turn_threshold_deg: HEAD_TURN_THRESHOLD_DEG,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            scale_percent: DEFAULT_DISPLAY_SCALE_PERCENT,
            wait_ms: 5,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            fourcc: DEFAULT_FOURCC.to_string(),
        }
    }
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/data_raw/videos/360/panorama_centered_1per.MP4"),
            output: PathBuf::from("data/data_raw/videos/360/panorama_centered_cropped_1per.MP4"),
            duration_seconds: DEFAULT_SNIPPET_SECONDS,
            crop: Some(CropWindow::default()),
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            default_inputs: vec![
                PathBuf::from("data/data_processed/videos/OpenFace/test_distance_webcam.csv"),
                PathBuf::from("data/data_processed/videos/OpenFace/test_distance_absolute_webcam.csv"),
            ],
            cell_width: 500,
            cell_height: 333,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Load `path` if given, falling back to defaults when it cannot be used
    #[must_use]
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        log::info!("Loading configuration from: {}", path.display());
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config file: {e}. Using defaults.");
                Self::default()
            }
        }
    }

    /// Validate thresholds and sizes. Model paths are checked when the models load.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.body_pose.min_detection_confidence) {
            return Err(Error::ConfigError(
                "Detection confidence must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !unit.contains(&self.body_pose.min_tracking_confidence) {
            return Err(Error::ConfigError(
                "Tracking confidence must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !unit.contains(&self.head_pose.face_confidence) {
            return Err(Error::ConfigError(
                "Face confidence must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.body_pose.input_size <= 0 {
            return Err(Error::ConfigError("Model input size must be positive".to_string()));
        }
        if !(0..=90).contains(&self.head_pose.turn_threshold_deg) {
            return Err(Error::ConfigError(
                "Turn threshold must be between 0 and 90 degrees".to_string(),
            ));
        }

        if self.display.scale_percent == 0 {
            return Err(Error::ConfigError("Display scale must be greater than 0".to_string()));
        }
        if self.display.wait_ms <= 0 {
            return Err(Error::ConfigError("Key wait must be at least 1 ms".to_string()));
        }

        if self.video.fourcc.chars().count() != 4 {
            return Err(Error::ConfigError(format!(
                "Codec code must have four characters, got {:?}",
                self.video.fourcc
            )));
        }

        if self.snippet.duration_seconds.is_nan() || self.snippet.duration_seconds <= 0.0 {
            return Err(Error::ConfigError("Snippet duration must be positive".to_string()));
        }
        if let Some(crop) = &self.snippet.crop {
            if crop.min_x >= crop.max_x || crop.min_y >= crop.max_y {
                return Err(Error::ConfigError(format!("Empty crop window: {crop:?}")));
            }
        }

        if self.plot.cell_width <= 0 || self.plot.cell_height <= 0 {
            return Err(Error::ConfigError("Plot cell size must be positive".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Motion-capture pipeline configuration

paths:
  default_body_video: "data/data_raw/videos/webcam/test_distance_webcam.avi"
  default_head_video: "data/data_raw/videos/test_1min_1p.avi"
  body_pose_output: "data/data_processed/videos/mediapipe"
  head_pose_output: "data/data_processed/videos/opencv_dlib_custom"
  plot_output: "data/data_processed/videos/OpenFace"

body_pose:
  model: "models/pose_landmark_full.onnx"
  input_size: 256
  input_layout: nhwc
  min_detection_confidence: 0.9
  min_tracking_confidence: 0.9

head_pose:
  face_detector_config: "models/deploy.prototxt.txt"
  face_detector_weights: "models/res10_300x300_ssd_iter_140000.caffemodel"
  face_confidence: 0.5
  landmark_model: "models/face_landmarks.onnx"
  box_shift: 0.1
  turn_threshold_deg: 48

display:
  scale_percent: 45
  wait_ms: 5

video:
  fourcc: "mp4v"

snippet:
  input: "data/data_raw/videos/360/panorama_centered_1per.MP4"
  output: "data/data_raw/videos/360/panorama_centered_cropped_1per.MP4"
  duration_seconds: 20.0
  crop:
    min_x: 550
    max_x: 1300
    min_y: 400
    max_y: 1000

plot:
  default_inputs:
    - "data/data_processed/videos/OpenFace/test_distance_webcam.csv"
    - "data/data_processed/videos/OpenFace/test_distance_absolute_webcam.csv"
  cell_width: 500
  cell_height: 333
"#;

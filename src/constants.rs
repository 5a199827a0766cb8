//! Constants used throughout the pipeline

/// Number of body landmarks produced by the pose model
pub const NUM_BODY_LANDMARKS: usize = 33;

/// Values per body-pose track row (33 landmarks × x, y, z)
pub const BODY_POSE_ROW_WIDTH: usize = 99;

/// Number of facial landmarks for full face
pub const NUM_FACIAL_LANDMARKS: usize = 68;

/// Facial landmarks used for the `PnP` solve, in model-point order:
/// nose tip, chin, left eye left corner, right eye right corner,
/// left mouth corner, right mouth corner.
pub const PNP_LANDMARK_INDICES: [usize; 6] = [30, 8, 36, 45, 48, 54];

/// 3D face model matching `PNP_LANDMARK_INDICES`
pub const FACE_MODEL_POINTS: [[f64; 3]; 6] = [
    [0.0, 0.0, 0.0],
    [0.0, -330.0, -65.0],
    [-225.0, 170.0, -135.0],
    [225.0, 170.0, -135.0],
    [-150.0, -150.0, -125.0],
    [150.0, -150.0, -125.0],
];

/// Values per head-pose track row (6 points × x, y, z)
pub const HEAD_POSE_ROW_WIDTH: usize = 18;

/// Default confidence thresholds for the body-pose model
pub const DEFAULT_DETECTION_CONFIDENCE: f32 = 0.9;
pub const DEFAULT_TRACKING_CONFIDENCE: f32 = 0.9;

/// Default confidence for the SSD face detector
pub const DEFAULT_FACE_CONFIDENCE: f32 = 0.5;

/// Angle at which a head turn is reported, in degrees
pub const HEAD_TURN_THRESHOLD_DEG: i32 = 48;

/// Angle reported when a slope is undefined
pub const DEGENERATE_ANGLE_DEG: i32 = 90;

/// Depth of the projected nose direction point
pub const NOSE_AXIS_DEPTH: f64 = 1000.0;

/// Preview window scale, percent of the original frame size
pub const DEFAULT_DISPLAY_SCALE_PERCENT: u32 = 45;

/// Key codes that stop an interactive run
pub const KEY_ESCAPE: i32 = 27;
pub const KEY_QUIT: i32 = b'q' as i32;

/// Codec used for every output video
pub const DEFAULT_FOURCC: &str = "mp4v";

/// Output naming
pub const BODY_POSE_SUFFIX: &str = "__bodypose";
pub const HEAD_POSE_SUFFIX: &str = "_headpose";
pub const COMPARISON_SEPARATOR: &str = "__vs__";
pub const COMPARISON_SUFFIX: &str = "__headpose.png";
pub const ROTATED_SUFFIX: &str = "__rotated";

/// Fixed y-axis ranges of the comparison plot (X, Y, Z translation)
pub const PLOT_Y_LIMITS: [(f64, f64); 3] = [(-500.0, 500.0), (-500.0, 500.0), (0.0, 1500.0)];

/// OpenFace columns plotted by the comparison tool
pub const PLOT_COLUMNS: [&str; 3] = ["pose_Tx", "pose_Ty", "pose_Tz"];
pub const PLOT_TIME_COLUMN: &str = "timestamp";

/// Default clip length for the snippet tool, seconds
pub const DEFAULT_SNIPPET_SECONDS: f64 = 20.0;

/// Camera matrix center factor
pub const CAMERA_CENTER_FACTOR: f64 = 2.0;

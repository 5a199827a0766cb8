//! Body-pose landmark detection with a 33-point pose landmark model.
//!
//! The model takes the whole frame resized to a square RGB input and
//! returns, per landmark, `x, y, z` in input pixels followed by visibility
//! and presence logits, plus a pose-presence score. Landmarks are reported
//! normalised by the input size, so `x` and `y` lie in `[0, 1]` for points
//! inside the frame.

use crate::{
    config::BodyPoseConfig,
    constants::NUM_BODY_LANDMARKS,
    landmarks::{Landmark, LandmarkLayout, LandmarkSet, BODY_POSE},
    track::LandmarkDetector,
    utils::{
        image_conversion::{bgr_to_model_input, TensorLayout},
        safe_cast::f64_to_i32_clamp,
    },
    Error, Result,
};
use log::{debug, info};
use ndarray::CowArray;
use opencv::{
    core::{Mat, Point, Scalar},
    imgproc::{self, LINE_AA},
    prelude::*,
};
use ort::{Environment, Session, Value};
use std::sync::Arc;

/// Values per landmark in the model output: x, y, z, visibility, presence
const VALUES_PER_LANDMARK: usize = 5;

/// Skeleton edges between body landmarks
pub const POSE_CONNECTIONS: [(usize, usize); 35] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 7),
    (0, 4),
    (4, 5),
    (5, 6),
    (6, 8),
    (9, 10),
    (11, 12),
    (11, 13),
    (13, 15),
    (15, 17),
    (15, 19),
    (15, 21),
    (17, 19),
    (12, 14),
    (14, 16),
    (16, 18),
    (16, 20),
    (16, 22),
    (18, 20),
    (11, 23),
    (12, 24),
    (23, 24),
    (23, 25),
    (24, 26),
    (25, 27),
    (26, 28),
    (27, 29),
    (28, 30),
    (29, 31),
    (30, 32),
    (27, 31),
    (28, 32),
];

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Run-level acceptance thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseThresholds {
    /// Minimum pose-presence score
    pub detection: f32,
    /// Minimum mean landmark visibility
    pub tracking: f32,
}

impl PoseThresholds {
    #[must_use]
    pub fn accepts(&self, presence: f32, mean_visibility: f32) -> bool {
        presence >= self.detection && mean_visibility >= self.tracking
    }
}

/// One decoded model output
#[derive(Debug, Clone, PartialEq)]
pub struct PoseOutput {
    pub landmarks: Vec<Landmark>,
    /// Per-landmark visibility probability
    pub visibility: Vec<f32>,
    /// Pose presence probability
    pub presence: f32,
}

impl PoseOutput {
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Landmark count is tiny
    pub fn mean_visibility(&self) -> f32 {
        if self.visibility.is_empty() {
            return 0.0;
        }
        self.visibility.iter().sum::<f32>() / self.visibility.len() as f32
    }
}

/// Decode the raw landmark tensor and presence score.
///
/// `raw` holds at least 33 landmarks of five values each; extra auxiliary
/// landmarks after the first 33 are ignored. A presence score outside
/// `[0, 1]` is treated as a logit.
///
/// # Errors
///
/// Returns an error if `raw` is too short or `input_size` is not positive
#[allow(clippy::cast_precision_loss)] // Input sizes are small
pub fn decode_output(raw: &[f32], presence: f32, input_size: i32) -> Result<PoseOutput> {
    let needed = NUM_BODY_LANDMARKS * VALUES_PER_LANDMARK;
    if raw.len() < needed {
        return Err(Error::ModelOutputError(format!(
            "Pose model returned {} values, expected at least {needed}",
            raw.len()
        )));
    }
    if input_size <= 0 {
        return Err(Error::InvalidInput(format!("Model input size must be positive, got {input_size}")));
    }

    let scale = input_size as f32;
    let (landmarks, visibility): (Vec<Landmark>, Vec<f32>) = raw[..needed]
        .chunks_exact(VALUES_PER_LANDMARK)
        .map(|v| (Landmark::new(v[0] / scale, v[1] / scale, v[2] / scale), sigmoid(v[3])))
        .unzip();
    let presence = if (0.0..=1.0).contains(&presence) { presence } else { sigmoid(presence) };

    Ok(PoseOutput {
        landmarks,
        visibility,
        presence,
    })
}

/// Pose landmark model running on `ONNX` Runtime
pub struct BodyPoseDetector {
    session: Session,
    input_size: i32,
    input_layout: TensorLayout,
    thresholds: PoseThresholds,
}

impl BodyPoseDetector {
    /// Load the model named in `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded or lacks the landmark
    /// and presence outputs
    pub fn new(config: &BodyPoseConfig) -> Result<Self> {
        info!("Initializing BodyPoseDetector with model: {}", config.model.display());
        let environment = Arc::new(
            Environment::builder()
                .with_name("body_pose")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(&config.model)?;

        if session.outputs.len() < 2 {
            return Err(Error::ModelError(format!(
                "Pose model has {} outputs, expected landmarks and presence",
                session.outputs.len()
            )));
        }

        Ok(Self {
            session,
            input_size: config.input_size,
            input_layout: config.input_layout,
            thresholds: PoseThresholds {
                detection: config.min_detection_confidence,
                tracking: config.min_tracking_confidence,
            },
        })
    }

    /// Run the model on one BGR frame
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails
    pub fn infer(&self, frame: &Mat) -> Result<PoseOutput> {
        let input = bgr_to_model_input(frame, self.input_size, self.input_layout)?;
        let cow_array = CowArray::from(input.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let mut outputs = outputs.into_iter();
        let landmarks = outputs
            .next()
            .ok_or_else(|| Error::ModelOutputError("No landmark output".to_string()))?;
        let presence = outputs
            .next()
            .ok_or_else(|| Error::ModelOutputError("No presence output".to_string()))?;

        let landmarks = landmarks.try_extract::<f32>()?;
        let raw: Vec<f32> = landmarks.view().iter().copied().collect();
        let presence = presence.try_extract::<f32>()?;
        let presence = presence
            .view()
            .iter()
            .next()
            .copied()
            .ok_or_else(|| Error::ModelOutputError("Empty presence output".to_string()))?;

        decode_output(&raw, presence, self.input_size)
    }
}

impl LandmarkDetector<Mat> for BodyPoseDetector {
    fn layout(&self) -> LandmarkLayout {
        BODY_POSE
    }

    fn detect(&mut self, frame: &Mat) -> Result<Option<LandmarkSet>> {
        let output = self.infer(frame)?;
        let visibility = output.mean_visibility();
        if !self.thresholds.accepts(output.presence, visibility) {
            debug!(
                "Pose rejected: presence {:.3}, visibility {visibility:.3}",
                output.presence
            );
            return Ok(None);
        }
        Ok(Some(LandmarkSet::new(output.landmarks)))
    }
}

/// Draw skeleton connections and landmarks of a normalised body set
///
/// # Errors
///
/// Returns an error if an `OpenCV` drawing call fails
pub fn draw_pose(image: &mut Mat, set: &LandmarkSet) -> Result<()> {
    let width = f64::from(image.cols());
    let height = f64::from(image.rows());
    let to_pixel = |p: &Landmark| {
        Point::new(
            f64_to_i32_clamp(f64::from(p.x) * width, i32::MIN, i32::MAX),
            f64_to_i32_clamp(f64::from(p.y) * height, i32::MIN, i32::MAX),
        )
    };

    for &(a, b) in &POSE_CONNECTIONS {
        if let (Some(p), Some(q)) = (set.get(a), set.get(b)) {
            imgproc::line(
                image,
                to_pixel(p),
                to_pixel(q),
                Scalar::new(224.0, 224.0, 224.0, 0.0),
                2,
                LINE_AA,
                0,
            )?;
        }
    }
    for point in set.points() {
        imgproc::circle(image, to_pixel(point), 2, Scalar::new(0.0, 0.0, 255.0, 0.0), 2, LINE_AA, 0)?;
    }
    Ok(())
}

//! Facial landmark detection on face crops.

use crate::{
    constants::NUM_FACIAL_LANDMARKS,
    utils::image_conversion::{bgr_to_model_input, TensorLayout},
    Error, Result,
};
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Point2f, Rect};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Default landmark detector input size
const DEFAULT_LANDMARK_INPUT_SIZE: i32 = 128;

/// 68-point facial landmark detector using `ONNX` Runtime.
///
/// The model sees a square face crop and returns 136 values, `(x, y)` per
/// landmark, normalised to the crop.
pub struct MarkDetector {
    session: Session,
    input_size: i32,
}

impl MarkDetector {
    /// Create a new landmark detector from an `ONNX` model file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The ONNX model file cannot be loaded
    /// - The model has no inputs or outputs
    /// - The ONNX runtime environment cannot be created
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        log::info!(
            "Initializing MarkDetector with model: {}",
            model_path.as_ref().display()
        );
        let environment = Arc::new(
            Environment::builder()
                .with_name("mark_detector")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        if session.inputs.is_empty() {
            return Err(Error::ModelError("Landmark model has no inputs".to_string()));
        }
        if session.outputs.is_empty() {
            return Err(Error::ModelOutputError("Landmark model has no outputs".to_string()));
        }

        Ok(Self {
            session,
            input_size: DEFAULT_LANDMARK_INPUT_SIZE,
        })
    }

    /// Detect the 68 landmarks of the face in `face_box`, in frame pixel coordinates
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The box does not lie inside the frame
    /// - Image preprocessing or inference fails
    /// - The output tensor has the wrong size
    pub fn detect(&self, frame: &Mat, face_box: Rect) -> Result<Vec<Point2f>> {
        let input = face_input(frame, face_box, self.input_size)?;
        let marks = self.forward(input)?;
        marks_to_points(&marks, face_box)
    }

    /// Run forward pass through the model
    fn forward(&self, inputs: Array4<f32>) -> Result<Vec<f32>> {
        let cow_array = CowArray::from(inputs.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;

        let marks_output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| Error::ModelOutputError("No output from model".to_string()))?;

        let marks_tensor = marks_output.try_extract::<f32>()?;
        let marks_view = marks_tensor.view();
        Ok(marks_view.iter().copied().collect())
    }
}

/// Map crop-normalised `(x, y)` pairs to frame coordinates
///
/// # Errors
///
/// Returns an error unless `marks` holds exactly 68 pairs
#[allow(clippy::cast_precision_loss)] // Precision loss acceptable for pixel coordinates
pub fn marks_to_points(marks: &[f32], face_box: Rect) -> Result<Vec<Point2f>> {
    if marks.len() != NUM_FACIAL_LANDMARKS * 2 {
        return Err(Error::ModelOutputError(format!(
            "Expected {} landmark values, got {}",
            NUM_FACIAL_LANDMARKS * 2,
            marks.len()
        )));
    }

    let (x0, y0) = (face_box.x as f32, face_box.y as f32);
    let (width, height) = (face_box.width as f32, face_box.height as f32);
    Ok(marks
        .chunks_exact(2)
        .map(|pair| Point2f::new(x0 + pair[0] * width, y0 + pair[1] * height))
        .collect())
}

/// Square model input cut from `frame` at `face_box`
fn face_input(frame: &Mat, face_box: Rect, size: i32) -> Result<Array4<f32>> {
    if face_box.width <= 0 || face_box.height <= 0 {
        return Err(Error::InvalidInput(format!("Empty face box: {face_box:?}")));
    }
    let face_image = Mat::roi(frame, face_box)?.try_clone()?;
    bgr_to_model_input(&face_image, size, TensorLayout::Nhwc)
}

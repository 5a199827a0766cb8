//! Face detection with the `OpenCV` DNN res10 SSD.

use crate::{utils::safe_cast::f64_to_i32_clamp, Error, Result};
use opencv::{
    core::{Mat, Rect, Scalar, Size},
    dnn,
    imgproc::{self, InterpolationFlags},
    prelude::*,
};
use std::path::Path;

/// SSD input resolution
const SSD_INPUT_SIZE: i32 = 300;

/// Per-channel mean subtracted by the SSD (BGR)
const SSD_MEAN: (f64, f64, f64) = (104.0, 117.0, 123.0);

/// Values per detection row: `[image_id, label, confidence, x0, y0, x1, y1]`
const SSD_ROW_LEN: usize = 7;

/// Face detection result
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDetection {
    /// Bounding box of the detected face, frame pixels
    pub bbox: Rect,
    /// Confidence score of the detection
    pub score: f32,
}

/// Res10 SSD face detector running through the `OpenCV` DNN module
pub struct FaceDetector {
    net: dnn::Net,
    conf_threshold: f32,
}

impl FaceDetector {
    /// Load the Caffe network
    ///
    /// # Errors
    ///
    /// Returns an error if either file is missing or the network cannot be parsed
    pub fn new<P: AsRef<Path>>(config_path: P, weights_path: P, conf_threshold: f32) -> Result<Self> {
        let config_path = config_path.as_ref();
        let weights_path = weights_path.as_ref();
        log::info!(
            "Initializing FaceDetector with {} and {}",
            config_path.display(),
            weights_path.display()
        );
        for path in [config_path, weights_path] {
            if !path.is_file() {
                return Err(Error::ModelError(format!("Face detector file not found: {}", path.display())));
            }
        }

        let net = dnn::read_net_from_caffe(&path_str(config_path)?, &path_str(weights_path)?)?;
        if net.empty()? {
            return Err(Error::ModelError("Face detector network is empty".to_string()));
        }

        Ok(Self { net, conf_threshold })
    }

    /// Detect faces, strongest first
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or the forward pass fails
    pub fn detect(&mut self, image: &Mat) -> Result<Vec<FaceDetection>> {
        let mut resized = Mat::default();
        imgproc::resize(
            image,
            &mut resized,
            Size::new(SSD_INPUT_SIZE, SSD_INPUT_SIZE),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let blob = dnn::blob_from_image(
            &resized,
            1.0,
            Size::new(SSD_INPUT_SIZE, SSD_INPUT_SIZE),
            Scalar::new(SSD_MEAN.0, SSD_MEAN.1, SSD_MEAN.2, 0.0),
            false,
            false,
            opencv::core::CV_32F,
        )?;
        self.net.set_input(&blob, "", 1.0, Scalar::default())?;
        let output = self.net.forward_single("")?;

        let raw = output.data_typed::<f32>()?;
        Ok(parse_detections(raw, image.cols(), image.rows(), self.conf_threshold))
    }
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(ToString::to_string)
        .ok_or_else(|| Error::InvalidInput(format!("Non UTF-8 model path: {}", path.display())))
}

/// Decode raw SSD rows into frame-space boxes.
///
/// Keeps rows with confidence strictly above `threshold`; corner coordinates
/// are truncated to whole pixels and clamped to the frame.
#[must_use]
pub fn parse_detections(raw: &[f32], width: i32, height: i32, threshold: f32) -> Vec<FaceDetection> {
    let mut faces: Vec<FaceDetection> = raw
        .chunks_exact(SSD_ROW_LEN)
        .filter(|row| row[2] > threshold)
        .filter_map(|row| {
            let scale = |v: f32, size: i32| f64_to_i32_clamp(f64::from(v) * f64::from(size), 0, size);
            let x0 = scale(row[3], width);
            let y0 = scale(row[4], height);
            let x1 = scale(row[5], width);
            let y1 = scale(row[6], height);
            (x1 > x0 && y1 > y0).then(|| FaceDetection {
                bbox: Rect::new(x0, y0, x1 - x0, y1 - y0),
                score: row[2],
            })
        })
        .collect();
    faces.sort_by(|a, b| b.score.total_cmp(&a.score));
    faces
}

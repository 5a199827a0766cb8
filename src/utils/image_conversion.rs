//! `OpenCV` frame to `ndarray` tensor conversion for the ONNX models.

use crate::{Error, Result};
use ndarray::{Array3, Array4, Axis};
use opencv::{
    core::{Mat, Size, Vec3f, CV_32F, CV_32FC3},
    imgproc::{self, InterpolationFlags},
    prelude::*,
};
use serde::{Deserialize, Serialize};

/// Memory layout a model expects for its image input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[batch, height, width, channels]`
    #[default]
    Nhwc,
    /// `[batch, channels, height, width]`
    Nchw,
}

/// Convert a 3-channel `CV_32FC3` Mat into an `(height, width, 3)` array
///
/// # Errors
///
/// Returns an error if the Mat is empty or not `CV_32FC3`
#[allow(clippy::cast_sign_loss)] // OpenCV dimensions are positive
pub fn mat_to_array3_f32(mat: &Mat) -> Result<Array3<f32>> {
    let rows = mat.rows();
    let cols = mat.cols();
    if rows <= 0 || cols <= 0 {
        return Err(Error::InvalidInput(format!("Invalid Mat dimensions: {rows}x{cols}")));
    }
    if mat.typ() != CV_32FC3 {
        return Err(Error::InvalidInput(format!(
            "Expected a 3-channel float image, got type {}",
            mat.typ()
        )));
    }

    let owned;
    let continuous = if mat.is_continuous() {
        mat
    } else {
        owned = mat.try_clone()?;
        &owned
    };
    let pixels = continuous.data_typed::<Vec3f>()?;
    let data: Vec<f32> = pixels.iter().flat_map(|p| [p[0], p[1], p[2]]).collect();

    Array3::from_shape_vec((rows as usize, cols as usize, 3), data)
        .map_err(|e| Error::InvalidInput(format!("Failed to create array from Mat: {e}")))
}

/// Resize a BGR frame to `size × size`, convert to RGB scaled to `[0, 1]`
/// and add a batch axis
///
/// # Errors
///
/// Returns an error if an `OpenCV` conversion fails
pub fn bgr_to_model_input(image: &Mat, size: i32, layout: TensorLayout) -> Result<Array4<f32>> {
    if size <= 0 {
        return Err(Error::InvalidInput(format!("Model input size must be positive, got {size}")));
    }

    let mut resized = Mat::default();
    imgproc::resize(
        image,
        &mut resized,
        Size::new(size, size),
        0.0,
        0.0,
        InterpolationFlags::INTER_LINEAR as i32,
    )?;

    let mut rgb_image = Mat::default();
    imgproc::cvt_color(&resized, &mut rgb_image, imgproc::COLOR_BGR2RGB, 0)?;

    let mut float_image = Mat::default();
    rgb_image.convert_to(&mut float_image, CV_32F, 1.0 / 255.0, 0.0)?;

    let hwc = mat_to_array3_f32(&float_image)?;
    let nhwc = hwc.insert_axis(Axis(0));
    Ok(match layout {
        TensorLayout::Nhwc => nhwc,
        TensorLayout::Nchw => nhwc.permuted_axes([0, 3, 1, 2]).as_standard_layout().into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};

    #[test]
    fn test_mat_to_array3_f32() {
        let mat = Mat::new_rows_cols_with_default(2, 3, CV_32FC3, Scalar::new(1.0, 2.0, 3.0, 0.0)).unwrap();

        let array = mat_to_array3_f32(&mat).unwrap();
        assert_eq!(array.shape(), &[2, 3, 3]);
        assert_eq!(array[[0, 0, 0]], 1.0);
        assert_eq!(array[[1, 2, 2]], 3.0);
    }

    #[test]
    fn test_mat_to_array3_rejects_bytes() {
        let mat = Mat::new_rows_cols_with_default(2, 2, CV_8UC3, Scalar::all(0.0)).unwrap();
        assert!(mat_to_array3_f32(&mat).is_err());
    }

    #[test]
    fn test_model_input_is_rgb_unit_range() {
        // Pure blue in BGR
        let mat = Mat::new_rows_cols_with_default(10, 20, CV_8UC3, Scalar::new(255.0, 0.0, 0.0, 0.0)).unwrap();

        let nhwc = bgr_to_model_input(&mat, 8, TensorLayout::Nhwc).unwrap();
        assert_eq!(nhwc.shape(), &[1, 8, 8, 3]);
        assert!((nhwc[[0, 4, 4, 2]] - 1.0).abs() < 1e-6);
        assert!(nhwc[[0, 4, 4, 0]].abs() < 1e-6);

        let nchw = bgr_to_model_input(&mat, 8, TensorLayout::Nchw).unwrap();
        assert_eq!(nchw.shape(), &[1, 3, 8, 8]);
        assert!((nchw[[0, 2, 4, 4]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_model_input_rejects_bad_size() {
        let mat = Mat::new_rows_cols_with_default(4, 4, CV_8UC3, Scalar::all(0.0)).unwrap();
        assert!(bgr_to_model_input(&mat, 0, TensorLayout::Nhwc).is_err());
    }
}

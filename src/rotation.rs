//! Rotation of landmark coordinates about the vertical axis.

use crate::{Error, Result};
use nalgebra::{Matrix3, Vector3};
use ndarray::{Array2, ArrayView2};

/// Default rotation angle of the `rotate-coords` tool, radians
pub const DEFAULT_THETA: f64 = -std::f64::consts::FRAC_PI_4;

/// Rotation matrix about the y axis
///
/// ```text
/// [ cos θ  0  sin θ ]
/// [   0    1    0   ]
/// [-sin θ  0  cos θ ]
/// ```
#[must_use]
pub fn rotate_y(theta: f64) -> Matrix3<f64> {
    let (sin, cos) = theta.sin_cos();
    Matrix3::new(cos, 0.0, sin, 0.0, 1.0, 0.0, -sin, 0.0, cos)
}

/// Apply `rotation` to every `(x, y, z)` triple of every row
///
/// # Errors
///
/// Returns an error if the column count is not a multiple of 3
pub fn rotate_track(track: ArrayView2<'_, f64>, rotation: &Matrix3<f64>) -> Result<Array2<f64>> {
    if track.ncols() % 3 != 0 {
        return Err(Error::InvalidInput(format!(
            "Track has {} columns, expected a multiple of 3",
            track.ncols()
        )));
    }

    let mut rotated = track.to_owned();
    for mut row in rotated.rows_mut() {
        for mut point in row.exact_chunks_mut(3) {
            let v = rotation * Vector3::new(point[0], point[1], point[2]);
            point[0] = v.x;
            point[1] = v.y;
            point[2] = v.z;
        }
    }
    Ok(rotated)
}

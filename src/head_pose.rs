//! Head orientation from facial landmarks.
//!
//! Six landmarks are matched against a fixed 3D face model with a `PnP`
//! solve. Two lines are derived from the solved pose: the nose line, from
//! the nose tip to the projection of a point 1000 units in front of the
//! face, and the side line across a wide annotation box. Their slopes give
//! the vertical and horizontal turn angles.

use crate::{
    constants::{
        CAMERA_CENTER_FACTOR, DEGENERATE_ANGLE_DEG, FACE_MODEL_POINTS, NOSE_AXIS_DEPTH, NUM_FACIAL_LANDMARKS,
        PNP_LANDMARK_INDICES,
    },
    face_detection::FaceDetector,
    landmarks::{Landmark, LandmarkLayout, LandmarkSet, HEAD_POSE},
    mark_detection::MarkDetector,
    track::LandmarkDetector,
    utils::{
        refine_boxes,
        safe_cast::{f64_to_i32_clamp, usize_to_i32},
    },
    Error, Result,
};
use log::{debug, info};
use opencv::{
    calib3d,
    core::{Mat, Point, Point2d, Point3d, Scalar, Vec3d, CV_64F},
    imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8, LINE_AA},
    prelude::*,
};
use std::fmt;

/// Solved head pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadPose {
    pub rotation: Vec3d,
    pub translation: Vec3d,
}

/// Pinhole camera sized from the frame: focal length = width, principal
/// point at the centre, no distortion
#[must_use]
pub fn camera_parameters(width: i32, height: i32) -> [f64; 9] {
    let focal_length = f64::from(width);
    let center = (
        f64::from(width) / CAMERA_CENTER_FACTOR,
        f64::from(height) / CAMERA_CENTER_FACTOR,
    );
    [focal_length, 0.0, center.0, 0.0, focal_length, center.1, 0.0, 0.0, 1.0]
}

/// The ten corners of an annotation box: a closed rear square at
/// `rear_depth` followed by a closed front square at `front_depth`
#[must_use]
pub fn annotation_box(rear_size: f64, rear_depth: f64, front_size: f64, front_depth: f64) -> [Point3d; 10] {
    let square = |size: f64, depth: f64| {
        [
            Point3d::new(-size, -size, depth),
            Point3d::new(-size, size, depth),
            Point3d::new(size, size, depth),
            Point3d::new(size, -size, depth),
            Point3d::new(-size, -size, depth),
        ]
    };
    let rear = square(rear_size, rear_depth);
    let front = square(front_size, front_depth);
    [
        rear[0], rear[1], rear[2], rear[3], rear[4], front[0], front[1], front[2], front[3], front[4],
    ]
}

/// Truncate toward zero to whole pixels
#[must_use]
pub fn to_pixel(point: Point2d) -> Point {
    Point::new(
        f64_to_i32_clamp(point.x, i32::MIN, i32::MAX),
        f64_to_i32_clamp(point.y, i32::MIN, i32::MAX),
    )
}

#[allow(clippy::cast_possible_truncation)] // The mean of two i32 fits in i32
fn floor_mid(a: i32, b: i32) -> i32 {
    (i64::from(a) + i64::from(b)).div_euclid(2) as i32
}

#[allow(clippy::cast_possible_truncation)] // Degrees of an arctangent are within ±90
fn truncated_degrees(radians: f64) -> i32 {
    radians.to_degrees() as i32
}

/// Angle of the line `p1 → p2` against the horizontal, whole degrees
/// truncated toward zero. A vertical line gives 90.
#[must_use]
pub fn slope_angle(p1: Point, p2: Point) -> i32 {
    let dx = i64::from(p2.x) - i64::from(p1.x);
    let dy = i64::from(p2.y) - i64::from(p1.y);
    if dx == 0 {
        return DEGENERATE_ANGLE_DEG;
    }
    #[allow(clippy::cast_precision_loss)]
    let m = dy as f64 / dx as f64;
    truncated_degrees(m.atan())
}

/// Angle of the normal to the line `p1 → p2`, whole degrees truncated
/// toward zero. Vertical and horizontal lines give 90.
#[must_use]
pub fn side_angle(p1: Point, p2: Point) -> i32 {
    let dx = i64::from(p2.x) - i64::from(p1.x);
    let dy = i64::from(p2.y) - i64::from(p1.y);
    if dx == 0 || dy == 0 {
        return DEGENERATE_ANGLE_DEG;
    }
    #[allow(clippy::cast_precision_loss)]
    let m = dy as f64 / dx as f64;
    truncated_degrees((-1.0 / m).atan())
}

/// Reported head turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadDirection {
    Down,
    Up,
    Right,
    Left,
}

impl HeadDirection {
    /// Vertical turn from the nose-line angle
    #[must_use]
    pub fn vertical(angle: i32, threshold: i32) -> Option<Self> {
        if angle >= threshold {
            Some(Self::Down)
        } else if angle <= -threshold {
            Some(Self::Up)
        } else {
            None
        }
    }

    /// Horizontal turn from the side-line angle
    #[must_use]
    pub fn horizontal(angle: i32, threshold: i32) -> Option<Self> {
        if angle >= threshold {
            Some(Self::Right)
        } else if angle <= -threshold {
            Some(Self::Left)
        } else {
            None
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Down => "Head down",
            Self::Up => "Head up",
            Self::Right => "Head right",
            Self::Left => "Head left",
        }
    }
}

impl fmt::Display for HeadDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything derived from one face on one frame
#[derive(Debug, Clone, PartialEq)]
pub struct HeadPoseReading {
    pub pose: HeadPose,
    /// The six `PnP` image points
    pub image_points: [Point; 6],
    pub nose_line: (Point, Point),
    pub side_line: (Point, Point),
    /// Nose-line angle (up/down)
    pub vertical_angle: i32,
    /// Side-line angle (left/right)
    pub horizontal_angle: i32,
    pub vertical: Option<HeadDirection>,
    pub horizontal: Option<HeadDirection>,
}

/// Head pose estimator using the `PnP` algorithm
pub struct HeadPoseEstimator {
    model_points: Vec<Point3d>,
    camera_matrix: Mat,
    dist_coeffs: Mat,
    frame_width: i32,
}

impl HeadPoseEstimator {
    /// Create an estimator for frames of the given size
    ///
    /// # Errors
    ///
    /// Returns an error if `OpenCV` matrix creation fails
    pub fn new(image_width: i32, image_height: i32) -> Result<Self> {
        info!("Initializing HeadPoseEstimator for {image_width}x{image_height} frames");
        let camera_data = camera_parameters(image_width, image_height);
        let mut camera_matrix = Mat::zeros(3, 3, CV_64F)?.to_mat()?;
        for (idx, &value) in camera_data.iter().enumerate() {
            *camera_matrix.at_2d_mut::<f64>(usize_to_i32(idx / 3)?, usize_to_i32(idx % 3)?)? = value;
        }
        let dist_coeffs = Mat::zeros(4, 1, CV_64F)?.to_mat()?;

        Ok(Self {
            model_points: FACE_MODEL_POINTS
                .iter()
                .map(|&[x, y, z]| Point3d::new(x, y, z))
                .collect(),
            camera_matrix,
            dist_coeffs,
            frame_width: image_width,
        })
    }

    /// Solve the pose from the six image points, in model-point order
    ///
    /// # Errors
    ///
    /// Returns an error if the point count is wrong or the solver fails
    pub fn solve(&self, image_points: &[Point2d]) -> Result<HeadPose> {
        if image_points.len() != self.model_points.len() {
            return Err(Error::InvalidInput(format!(
                "Expected {} image points, got {}",
                self.model_points.len(),
                image_points.len()
            )));
        }

        let object_points = Mat::from_slice(&self.model_points)?;
        let image_points = Mat::from_slice(image_points)?;
        let mut rvec = Mat::default();
        let mut tvec = Mat::default();

        let solved = calib3d::solve_pnp(
            &object_points,
            &image_points,
            &self.camera_matrix,
            &self.dist_coeffs,
            &mut rvec,
            &mut tvec,
            false,
            calib3d::SOLVEPNP_UPNP,
        )?;
        if !solved {
            return Err(Error::ModelError("PnP solver did not converge".to_string()));
        }

        Ok(HeadPose {
            rotation: Vec3d::from([
                *rvec.at_2d::<f64>(0, 0)?,
                *rvec.at_2d::<f64>(1, 0)?,
                *rvec.at_2d::<f64>(2, 0)?,
            ]),
            translation: Vec3d::from([
                *tvec.at_2d::<f64>(0, 0)?,
                *tvec.at_2d::<f64>(1, 0)?,
                *tvec.at_2d::<f64>(2, 0)?,
            ]),
        })
    }

    /// Project model-space points into the image
    ///
    /// # Errors
    ///
    /// Returns an error if the projection fails
    pub fn project(&self, pose: &HeadPose, points: &[Point3d]) -> Result<Vec<Point2d>> {
        let object_points = Mat::from_slice(points)?;
        let mut image_points = Mat::default();
        calib3d::project_points(
            &object_points,
            &pose.rotation,
            &pose.translation,
            &self.camera_matrix,
            &self.dist_coeffs,
            &mut image_points,
            &mut Mat::default(),
            0.0,
        )?;
        Ok(image_points.data_typed::<Point2d>()?.to_vec())
    }

    /// Nose tip to the projection of a point straight out of the face
    ///
    /// # Errors
    ///
    /// Returns an error if the projection fails
    pub fn nose_line(&self, pose: &HeadPose, nose_tip: Point) -> Result<(Point, Point)> {
        let end = self.project(pose, &[Point3d::new(0.0, 0.0, NOSE_AXIS_DEPTH)])?;
        let end = end
            .first()
            .copied()
            .ok_or_else(|| Error::ModelOutputError("Nose projection returned no point".to_string()))?;
        Ok((nose_tip, to_pixel(end)))
    }

    /// Side line across an annotation box as wide as the frame: from the
    /// third rear corner to the midpoint of the first and fourth front corners
    ///
    /// # Errors
    ///
    /// Returns an error if the projection fails
    pub fn side_line(&self, pose: &HeadPose) -> Result<(Point, Point)> {
        let front_size = f64::from(self.frame_width);
        let corners = annotation_box(1.0, 0.0, front_size, front_size * 2.0);
        let projected: Vec<Point> = self.project(pose, &corners)?.into_iter().map(to_pixel).collect();
        if projected.len() != corners.len() {
            return Err(Error::ModelOutputError(format!(
                "Annotation box projected to {} points",
                projected.len()
            )));
        }
        let start = projected[2];
        let end = Point::new(
            floor_mid(projected[5].x, projected[8].x),
            floor_mid(projected[5].y, projected[8].y),
        );
        Ok((start, end))
    }

    /// Solve, project and classify one face
    ///
    /// # Errors
    ///
    /// Returns an error if the solve or a projection fails
    pub fn analyze(&self, image_points: &[Point2d], threshold: i32) -> Result<HeadPoseReading> {
        let pose = self.solve(image_points)?;
        let mut pixels = [Point::default(); 6];
        for (pixel, &point) in pixels.iter_mut().zip(image_points) {
            *pixel = to_pixel(point);
        }

        let nose_line = self.nose_line(&pose, pixels[0])?;
        let side_line = self.side_line(&pose)?;
        let vertical_angle = slope_angle(nose_line.0, nose_line.1);
        let horizontal_angle = side_angle(side_line.0, side_line.1);
        debug!("Head angles: vertical {vertical_angle}, horizontal {horizontal_angle}");

        Ok(HeadPoseReading {
            pose,
            image_points: pixels,
            nose_line,
            side_line,
            vertical_angle,
            horizontal_angle,
            vertical: HeadDirection::vertical(vertical_angle, threshold),
            horizontal: HeadDirection::horizontal(horizontal_angle, threshold),
        })
    }
}

impl HeadPoseReading {
    /// Draw the six points, both lines, the angles and any turn labels
    ///
    /// # Errors
    ///
    /// Returns an error if an `OpenCV` drawing call fails
    pub fn draw(&self, image: &mut Mat) -> Result<()> {
        let label_color = Scalar::new(255.0, 255.0, 128.0, 0.0);

        for &point in &self.image_points {
            imgproc::circle(image, point, 3, Scalar::new(0.0, 0.0, 255.0, 0.0), -1, LINE_8, 0)?;
        }
        imgproc::line(
            image,
            self.nose_line.0,
            self.nose_line.1,
            Scalar::new(0.0, 255.0, 255.0, 0.0),
            2,
            LINE_8,
            0,
        )?;
        imgproc::line(
            image,
            self.side_line.0,
            self.side_line.1,
            Scalar::new(255.0, 255.0, 0.0, 0.0),
            2,
            LINE_8,
            0,
        )?;

        if let Some(direction) = self.vertical {
            imgproc::put_text(image, direction.label(), Point::new(30, 30), FONT_HERSHEY_SIMPLEX, 2.0, label_color, 3, LINE_AA, false)?;
        }
        if let Some(direction) = self.horizontal {
            imgproc::put_text(image, direction.label(), Point::new(90, 30), FONT_HERSHEY_SIMPLEX, 2.0, label_color, 3, LINE_AA, false)?;
        }

        imgproc::put_text(
            image,
            &self.vertical_angle.to_string(),
            self.nose_line.0,
            FONT_HERSHEY_SIMPLEX,
            2.0,
            Scalar::new(128.0, 255.0, 255.0, 0.0),
            3,
            LINE_AA,
            false,
        )?;
        imgproc::put_text(
            image,
            &self.horizontal_angle.to_string(),
            self.side_line.0,
            FONT_HERSHEY_SIMPLEX,
            2.0,
            label_color,
            3,
            LINE_AA,
            false,
        )?;
        Ok(())
    }
}

/// The six `PnP` landmarks of a 68-point set, as solver input
///
/// # Errors
///
/// Returns an error if the set is not a 68-point set
pub fn pnp_points(set: &LandmarkSet) -> Result<Vec<Point2d>> {
    if set.len() != NUM_FACIAL_LANDMARKS {
        return Err(Error::ModelValidationError(format!(
            "Expected {NUM_FACIAL_LANDMARKS} facial landmarks, got {}",
            set.len()
        )));
    }
    PNP_LANDMARK_INDICES
        .iter()
        .map(|&i| {
            set.get(i)
                .map(|p| Point2d::new(f64::from(p.x), f64::from(p.y)))
                .ok_or_else(|| Error::ModelValidationError(format!("Missing landmark {i}")))
        })
        .collect()
}

/// Face detector and landmark model combined into a per-frame landmark oracle.
///
/// The most confident face is used; its 68 landmarks are returned in frame
/// pixels with `z = 0`.
pub struct FaceLandmarkDetector {
    face_detector: FaceDetector,
    mark_detector: MarkDetector,
    box_shift: f32,
}

impl FaceLandmarkDetector {
    #[must_use]
    pub fn new(face_detector: FaceDetector, mark_detector: MarkDetector, box_shift: f32) -> Self {
        Self {
            face_detector,
            mark_detector,
            box_shift,
        }
    }
}

impl LandmarkDetector<Mat> for FaceLandmarkDetector {
    fn layout(&self) -> LandmarkLayout {
        HEAD_POSE
    }

    fn detect(&mut self, frame: &Mat) -> Result<Option<LandmarkSet>> {
        let faces = self.face_detector.detect(frame)?;
        let Some(face) = faces.first() else {
            return Ok(None);
        };
        debug!("{} face(s), using {:?} ({:.2})", faces.len(), face.bbox, face.score);

        let mut boxes = [face.bbox];
        refine_boxes(&mut boxes, frame.cols(), frame.rows(), self.box_shift)?;
        let marks = self.mark_detector.detect(frame, boxes[0])?;

        Ok(Some(LandmarkSet::new(
            marks.iter().map(|p| Landmark::planar(p.x, p.y)).collect(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_line_is_ninety() {
        assert_eq!(slope_angle(Point::new(10, 10), Point::new(10, 500)), 90);
        assert_eq!(slope_angle(Point::new(10, 10), Point::new(10, 10)), 90);
        assert_eq!(side_angle(Point::new(5, 0), Point::new(5, 100)), 90);
    }

    #[test]
    fn test_horizontal_side_line_is_ninety() {
        assert_eq!(side_angle(Point::new(0, 7), Point::new(100, 7)), 90);
    }

    #[test]
    fn test_slope_angle_truncates() {
        assert_eq!(slope_angle(Point::new(0, 0), Point::new(100, 100)), 45);
        assert_eq!(slope_angle(Point::new(0, 0), Point::new(100, -100)), -45);
        // atan(2) = 63.43°
        assert_eq!(slope_angle(Point::new(0, 0), Point::new(1, 2)), 63);
        assert_eq!(slope_angle(Point::new(0, 0), Point::new(-1, 2)), -63);
        assert_eq!(slope_angle(Point::new(0, 0), Point::new(10, 0)), 0);
    }

    #[test]
    fn test_side_angle_uses_normal() {
        // m = 1 → atan(-1) = -45°
        assert_eq!(side_angle(Point::new(0, 0), Point::new(10, 10)), -45);
        // m = -0.5 → atan(2) = 63.43°
        assert_eq!(side_angle(Point::new(0, 0), Point::new(10, -5)), 63);
    }

    #[test]
    fn test_direction_thresholds() {
        assert_eq!(HeadDirection::vertical(48, 48), Some(HeadDirection::Down));
        assert_eq!(HeadDirection::vertical(47, 48), None);
        assert_eq!(HeadDirection::vertical(-48, 48), Some(HeadDirection::Up));
        assert_eq!(HeadDirection::horizontal(90, 48), Some(HeadDirection::Right));
        assert_eq!(HeadDirection::horizontal(-60, 48), Some(HeadDirection::Left));
        assert_eq!(HeadDirection::horizontal(0, 48), None);
        assert_eq!(HeadDirection::Left.to_string(), "Head left");
    }

    #[test]
    fn test_camera_parameters() {
        let k = camera_parameters(640, 480);
        assert_eq!(k, [640.0, 0.0, 320.0, 0.0, 640.0, 240.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_annotation_box_corners() {
        let corners = annotation_box(1.0, 0.0, 640.0, 1280.0);
        assert_eq!(corners[0], corners[4]);
        assert_eq!(corners[5], corners[9]);
        assert_eq!(corners[2], Point3d::new(1.0, 1.0, 0.0));
        assert_eq!(corners[8], Point3d::new(640.0, -640.0, 1280.0));
    }

    #[test]
    fn test_floor_mid_rounds_down() {
        assert_eq!(floor_mid(3, 4), 3);
        assert_eq!(floor_mid(-3, -4), -4);
        assert_eq!(floor_mid(i32::MAX, i32::MAX), i32::MAX);
    }

    #[test]
    fn test_frontal_pose_has_vertical_nose_line() {
        let estimator = HeadPoseEstimator::new(640, 480).unwrap();
        let pose = HeadPose {
            rotation: Vec3d::from([0.0, 0.0, 0.0]),
            translation: Vec3d::from([0.0, 0.0, 1000.0]),
        };
        let nose = estimator.project(&pose, &[Point3d::new(0.0, 0.0, 0.0)]).unwrap();
        assert!((nose[0].x - 320.0).abs() < 1e-9);
        assert!((nose[0].y - 240.0).abs() < 1e-9);

        let (start, end) = estimator.nose_line(&pose, to_pixel(nose[0])).unwrap();
        assert_eq!(start, end);
        assert_eq!(slope_angle(start, end), 90);
    }

    #[test]
    fn test_solve_recovers_projected_pose() {
        let estimator = HeadPoseEstimator::new(640, 480).unwrap();
        let truth = HeadPose {
            rotation: Vec3d::from([0.1, -0.2, 0.05]),
            translation: Vec3d::from([10.0, -20.0, 1500.0]),
        };
        let model: Vec<Point3d> = FACE_MODEL_POINTS.iter().map(|&[x, y, z]| Point3d::new(x, y, z)).collect();
        let image_points = estimator.project(&truth, &model).unwrap();

        let solved = estimator.solve(&image_points).unwrap();
        let reprojected = estimator.project(&solved, &model).unwrap();
        for (a, b) in image_points.iter().zip(&reprojected) {
            assert!((a.x - b.x).abs() < 1.0 && (a.y - b.y).abs() < 1.0);
        }
    }

    #[test]
    fn test_solve_rejects_wrong_point_count() {
        let estimator = HeadPoseEstimator::new(640, 480).unwrap();
        assert!(estimator.solve(&[Point2d::new(0.0, 0.0); 4]).is_err());
    }

    #[test]
    fn test_pnp_points_selects_model_order() {
        let set = LandmarkSet::new((0..68).map(|i| Landmark::planar(i as f32, 0.0)).collect());
        let points = pnp_points(&set).unwrap();
        let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![30.0, 8.0, 36.0, 45.0, 48.0, 54.0]);

        let short = LandmarkSet::new(vec![Landmark::default(); 6]);
        assert!(pnp_points(&short).is_err());
    }
}

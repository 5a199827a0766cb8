//! Landmark sets and the layouts that flatten them into track rows.

use crate::{
    constants::{NUM_BODY_LANDMARKS, NUM_FACIAL_LANDMARKS, PNP_LANDMARK_INDICES},
    Error, Result,
};

/// A single keypoint in the detector's native coordinate convention
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// A planar landmark (`z = 0`)
    #[must_use]
    pub const fn planar(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// Ordered landmarks from one successful detection
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    #[must_use]
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }
}

/// How a detector's landmark set maps onto a fixed-width track row.
///
/// Rows are built by walking the selected landmarks in order and emitting
/// `x, y, z` for each one. A layout without a selection takes every
/// landmark in index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LandmarkLayout {
    /// Short name used in logs
    pub name: &'static str,
    /// Number of landmarks the detector must return
    pub source_points: usize,
    /// Landmarks copied into the row, in column order
    pub selection: Option<&'static [usize]>,
}

/// Body pose: 33 landmarks, index ascending, 99 columns
pub const BODY_POSE: LandmarkLayout = LandmarkLayout {
    name: "bodypose",
    source_points: NUM_BODY_LANDMARKS,
    selection: None,
};

/// Head pose: the six `PnP` landmarks out of the 68-point face model, 18 columns
pub const HEAD_POSE: LandmarkLayout = LandmarkLayout {
    name: "headpose",
    source_points: NUM_FACIAL_LANDMARKS,
    selection: Some(&PNP_LANDMARK_INDICES),
};

impl LandmarkLayout {
    /// Number of landmarks that land in a row
    #[must_use]
    pub fn row_points(&self) -> usize {
        self.selection.map_or(self.source_points, <[usize]>::len)
    }

    /// Row width `W`
    #[must_use]
    pub fn width(&self) -> usize {
        self.row_points() * 3
    }

    /// Check that a detection honours the layout's landmark count
    ///
    /// # Errors
    ///
    /// Returns an error if the set does not hold exactly `source_points` landmarks
    pub fn validate(&self, set: &LandmarkSet) -> Result<()> {
        if set.len() != self.source_points {
            return Err(Error::ModelValidationError(format!(
                "{} detector returned {} landmarks, expected {}",
                self.name,
                set.len(),
                self.source_points
            )));
        }
        Ok(())
    }

    /// Flatten a landmark set into a row of exactly `width()` values
    ///
    /// # Errors
    ///
    /// Returns an error if the set does not match the layout
    pub fn flatten(&self, set: &LandmarkSet) -> Result<Vec<f64>> {
        self.validate(set)?;
        let mut row = Vec::with_capacity(self.width());
        let mut push = |p: &Landmark| {
            row.push(f64::from(p.x));
            row.push(f64::from(p.y));
            row.push(f64::from(p.z));
        };
        match self.selection {
            None => set.points().iter().for_each(&mut push),
            Some(indices) => {
                for &i in indices {
                    let point = set.get(i).ok_or_else(|| {
                        Error::ModelValidationError(format!("{} layout selects missing landmark {i}", self.name))
                    })?;
                    push(point);
                }
            }
        }
        Ok(row)
    }

    /// An all-zero row
    #[must_use]
    pub fn zero_row(&self) -> Vec<f64> {
        vec![0.0; self.width()]
    }
}

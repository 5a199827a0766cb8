//! Dense per-frame track matrix.

use super::state::RowOrigin;
use crate::{Error, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};

/// One emitted row, tagged with the frame that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRow {
    pub frame_idx: usize,
    pub values: Vec<f64>,
    pub origin: RowOrigin,
}

/// Row counts by origin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackSummary {
    pub detected: usize,
    pub carried_forward: usize,
    pub zero_filled: usize,
}

impl TrackSummary {
    #[must_use]
    pub fn total(&self) -> usize {
        self.detected + self.carried_forward + self.zero_filled
    }
}

/// One row per consumed frame, fixed width, no gaps
#[derive(Debug, Clone)]
pub struct DenseMatrix {
    values: Array2<f64>,
    frame_indices: Vec<usize>,
    origins: Vec<RowOrigin>,
}

impl DenseMatrix {
    /// Empty matrix with `width` columns
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            values: Array2::zeros((0, width)),
            frame_indices: Vec::new(),
            origins: Vec::new(),
        }
    }

    /// Append a row
    ///
    /// # Errors
    ///
    /// Returns an error if the row width differs from the matrix width
    pub fn push(&mut self, row: &TrackRow) -> Result<()> {
        if row.values.len() != self.width() {
            return Err(Error::Track(format!(
                "row for frame {} has {} values, track width is {}",
                row.frame_idx,
                row.values.len(),
                self.width()
            )));
        }
        self.values
            .push_row(ArrayView1::from(row.values.as_slice()))
            .map_err(|e| Error::Track(format!("failed to append row: {e}")))?;
        self.frame_indices.push(row.frame_idx);
        self.origins.push(row.origin);
        Ok(())
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.values.nrows()
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.values.ncols()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    #[must_use]
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    #[must_use]
    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.row(index)
    }

    #[must_use]
    pub fn frame_indices(&self) -> &[usize] {
        &self.frame_indices
    }

    #[must_use]
    pub fn origins(&self) -> &[RowOrigin] {
        &self.origins
    }

    #[must_use]
    pub fn summary(&self) -> TrackSummary {
        self.origins.iter().fold(TrackSummary::default(), |mut acc, origin| {
            match origin {
                RowOrigin::Detected => acc.detected += 1,
                RowOrigin::CarriedForward => acc.carried_forward += 1,
                RowOrigin::ZeroFilled => acc.zero_filled += 1,
            }
            acc
        })
    }

    /// Take the numeric table, dropping row tags
    #[must_use]
    pub fn into_values(self) -> Array2<f64> {
        self.values
    }
}

//! Carry-forward policy for missed detections.
//!
//! The tracker is in one of two states. Before the first successful
//! detection every miss produces an all-zero row; afterwards every miss
//! repeats the row of the last successful detection, unchanged, for as
//! long as detections keep failing.

use crate::landmarks::{LandmarkLayout, LandmarkSet};

/// Where the values of a track row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrigin {
    /// Fresh detection on this frame
    Detected,
    /// Repeat of the last successful detection
    CarriedForward,
    /// No detection has happened yet
    ZeroFilled,
}

/// Tracker state between frames
#[derive(Debug, Clone, Default)]
pub enum TrackState {
    /// No frame has produced a detection yet
    #[default]
    NoPriorDetection,
    /// At least one detection has happened
    HasPriorDetection {
        /// Most recent successful detection
        last_known_good: LandmarkSet,
        /// `last_known_good` flattened with the run's layout
        row: Vec<f64>,
    },
}

impl TrackState {
    /// Replace the last known good detection
    pub fn on_detection(&mut self, set: LandmarkSet, row: Vec<f64>) {
        *self = Self::HasPriorDetection {
            last_known_good: set,
            row,
        };
    }

    /// Row to emit for a frame without detection. The state is left as is.
    #[must_use]
    pub fn on_miss(&self, layout: &LandmarkLayout) -> (Vec<f64>, RowOrigin) {
        match self {
            Self::NoPriorDetection => (layout.zero_row(), RowOrigin::ZeroFilled),
            Self::HasPriorDetection { row, .. } => (row.clone(), RowOrigin::CarriedForward),
        }
    }

    #[must_use]
    pub fn last_known_good(&self) -> Option<&LandmarkSet> {
        match self {
            Self::NoPriorDetection => None,
            Self::HasPriorDetection { last_known_good, .. } => Some(last_known_good),
        }
    }

    #[must_use]
    pub fn has_prior_detection(&self) -> bool {
        matches!(self, Self::HasPriorDetection { .. })
    }
}

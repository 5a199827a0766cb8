//! Frame-by-frame landmark tracking.
//!
//! [`TrackBuilder`] pulls frames from a [`FrameSource`], hands each one to a
//! [`LandmarkDetector`] and appends exactly one row per frame to a
//! [`DenseMatrix`]. Missed detections and frames that fail to decode are
//! filled in by the carry-forward policy in [`state`], so the track never
//! has gaps.
//!
//! Decode failures are bounded by the source's declared frame count: a
//! failure at index `idx < declared` is a missed detection, a failure at
//! `idx >= declared` ends the stream.

/// Carry-forward policy and tracker state
pub mod state;

/// Dense output matrix
pub mod matrix;

pub use matrix::{DenseMatrix, TrackRow, TrackSummary};
pub use state::{RowOrigin, TrackState};

use crate::{
    landmarks::{LandmarkLayout, LandmarkSet},
    Result,
};
use log::{debug, info, warn};

/// Result of one read from a frame source
#[derive(Debug)]
pub enum FrameRead<P> {
    /// A decoded frame
    Frame(P),
    /// The frame could not be decoded
    DecodeFailure,
    /// The source has no more frames
    EndOfStream,
}

/// Ordered, finite, non-restartable sequence of frames
pub trait FrameSource {
    /// Decoded pixel data
    type Pixels;

    /// Number of frames the container claims to hold (0 if unknown)
    fn declared_frame_count(&self) -> usize;

    /// Advance the read cursor by one frame
    fn read_next(&mut self) -> FrameRead<Self::Pixels>;
}

/// A decoded frame with its 0-based position in the stream
#[derive(Debug, Clone)]
pub struct Frame<P> {
    pub idx: usize,
    pub pixels: P,
}

/// Per-frame landmark oracle
///
/// Implementations must not carry state from one frame to the next, and
/// must use the same thresholds for the whole run. `Ok(None)` means no
/// subject or confidence below threshold; an `Err` is logged and handled
/// like `Ok(None)`.
pub trait LandmarkDetector<P> {
    /// Layout of the sets this detector returns
    fn layout(&self) -> LandmarkLayout;

    /// Detect landmarks on one frame
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails on this frame
    fn detect(&mut self, pixels: &P) -> Result<Option<LandmarkSet>>;
}

/// Whether the tracking loop should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameControl {
    Continue,
    Stop,
}

/// Hook run after each row is appended: annotation, video output, preview
/// and the cancellation check live here.
pub trait FrameObserver<P> {
    /// Called for every decoded frame. `detection` is the fresh detection on
    /// this frame, if any.
    ///
    /// # Errors
    ///
    /// Any error aborts the run
    fn on_frame(&mut self, frame: &mut Frame<P>, detection: Option<&LandmarkSet>, row: &TrackRow)
        -> Result<FrameControl>;

    /// Called for a frame that failed to decode and was filled in.
    ///
    /// # Errors
    ///
    /// Any error aborts the run
    fn on_skipped(&mut self, _row: &TrackRow) -> Result<FrameControl> {
        Ok(FrameControl::Continue)
    }
}

/// Observer that does nothing
pub struct NoObserver;

impl<P> FrameObserver<P> for NoObserver {
    fn on_frame(&mut self, _: &mut Frame<P>, _: Option<&LandmarkSet>, _: &TrackRow) -> Result<FrameControl> {
        Ok(FrameControl::Continue)
    }
}

/// Builds a dense landmark track for one run
pub struct TrackBuilder {
    layout: LandmarkLayout,
    state: TrackState,
    matrix: DenseMatrix,
}

impl TrackBuilder {
    #[must_use]
    pub fn new(layout: LandmarkLayout) -> Self {
        Self {
            layout,
            state: TrackState::default(),
            matrix: DenseMatrix::new(layout.width()),
        }
    }

    #[must_use]
    pub fn layout(&self) -> &LandmarkLayout {
        &self.layout
    }

    #[must_use]
    pub fn state(&self) -> &TrackState {
        &self.state
    }

    /// Number of rows appended so far
    #[must_use]
    pub fn rows(&self) -> usize {
        self.matrix.rows()
    }

    /// Apply one transition and append the emitted row
    ///
    /// # Errors
    ///
    /// Returns an error if the detection does not match the layout
    pub fn record(&mut self, frame_idx: usize, detection: Option<LandmarkSet>) -> Result<TrackRow> {
        let (values, origin) = match detection {
            Some(set) => {
                let values = self.layout.flatten(&set)?;
                self.state.on_detection(set, values.clone());
                (values, RowOrigin::Detected)
            }
            None => self.state.on_miss(&self.layout),
        };
        let row = TrackRow {
            frame_idx,
            values,
            origin,
        };
        self.matrix.push(&row)?;
        Ok(row)
    }

    /// Consume `source` until it ends or the observer stops the run.
    ///
    /// The returned matrix holds one row per consumed frame; a cancelled
    /// run returns the rows produced so far.
    ///
    /// # Errors
    ///
    /// Returns an error if a detection violates the layout or the observer fails
    pub fn process<S, D, O>(mut self, source: &mut S, detector: &mut D, observer: &mut O) -> Result<DenseMatrix>
    where
        S: FrameSource,
        D: LandmarkDetector<S::Pixels> + ?Sized,
        O: FrameObserver<S::Pixels> + ?Sized,
    {
        let declared = source.declared_frame_count();
        info!(
            "Tracking {} landmarks ({} columns), {} frames declared",
            self.layout.name,
            self.layout.width(),
            declared
        );

        let mut idx = 0;
        loop {
            let control = match source.read_next() {
                FrameRead::EndOfStream => {
                    info!("End of stream after {idx} frames");
                    break;
                }
                FrameRead::DecodeFailure => {
                    warn!("skipped: idx={idx}");
                    if idx >= declared {
                        info!("End of Files.");
                        break;
                    }
                    let row = self.record(idx, None)?;
                    idx += 1;
                    observer.on_skipped(&row)?
                }
                FrameRead::Frame(pixels) => {
                    let mut frame = Frame { idx, pixels };
                    let detection = match detector.detect(&frame.pixels) {
                        Ok(detection) => detection,
                        Err(e) => {
                            warn!("Detector failed on frame {idx}: {e}");
                            None
                        }
                    };
                    let detected = detection.is_some();
                    let row = self.record(idx, detection)?;
                    debug!("frame {idx}: {:?}", row.origin);
                    idx += 1;
                    let fresh = if detected { self.state.last_known_good() } else { None };
                    observer.on_frame(&mut frame, fresh, &row)?
                }
            };
            if control == FrameControl::Stop {
                info!("Run stopped after {idx} frames");
                break;
            }
        }

        let summary = self.matrix.summary();
        info!(
            "Track complete: {} rows ({} detected, {} carried forward, {} zero-filled)",
            summary.total(),
            summary.detected,
            summary.carried_forward,
            summary.zero_filled
        );
        Ok(self.finish())
    }

    /// Finish the run and take the matrix
    #[must_use]
    pub fn finish(self) -> DenseMatrix {
        self.matrix
    }
}

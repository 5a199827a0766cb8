//! Batch tools for a motion-capture research pipeline.
//!
//! This library provides:
//! - Body-pose landmark tracks from video (33-point pose model on ONNX Runtime)
//! - Head orientation from facial landmarks (`OpenCV` DNN face detector,
//!   68-point landmark model, `PnP`)
//! - Clip cutting and cropping
//! - Head-pose comparison plots from OpenFace CSV files
//! - Rotation of landmark coordinates about the vertical axis
//!
//! The body-pose and head-pose tools share one tracking loop:
//! 1. A [`track::FrameSource`] yields frames in order
//! 2. A [`track::LandmarkDetector`] returns zero or one landmark set per frame
//! 3. The [`track::TrackBuilder`] appends exactly one row per frame, carrying
//!    the last detection forward over misses
//! 4. The rows are saved as a headerless CSV table
//!
//! # Examples
//!
//! ## Tracking a video
//!
//! ```no_run
//! use mocap_pipeline::{
//!     body_pose::BodyPoseDetector,
//!     config::Config,
//!     table::save_track,
//!     track::{NoObserver, TrackBuilder},
//!     landmarks::BODY_POSE,
//!     video::VideoFileSource,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let mut source = VideoFileSource::open("clip.avi")?;
//! let mut detector = BodyPoseDetector::new(&config.body_pose)?;
//!
//! let matrix = TrackBuilder::new(BODY_POSE).process(&mut source, &mut detector, &mut NoObserver)?;
//! println!("{} frames, {} columns", matrix.rows(), matrix.width());
//! save_track("clip__bodypose.csv", &matrix)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Rotating a track
//!
//! ```no_run
//! use mocap_pipeline::{rotation::{rotate_track, rotate_y, DEFAULT_THETA}, table::load_track};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let track = load_track("clip__bodypose.csv")?;
//! let rotated = rotate_track(track.view(), &rotate_y(DEFAULT_THETA))?;
//! assert_eq!(rotated.dim(), track.dim());
//! # Ok(())
//! # }
//! ```

/// Error types and result handling
pub mod error;

/// Constants used throughout the pipeline
pub mod constants;

/// Configuration management
pub mod config;

/// Command line helpers shared by the binaries
pub mod cli;

/// Landmark sets and track row layouts
pub mod landmarks;

/// Frame-by-frame landmark tracking
pub mod track;

/// Video input and output
pub mod video;

/// CSV track tables
pub mod table;

/// Body-pose landmark detection
pub mod body_pose;

/// Face detection module for finding faces in images
pub mod face_detection;

/// Facial landmark detection module for finding 68 key points
pub mod mark_detection;

/// Head pose estimation using the `PnP` algorithm
pub mod head_pose;

/// Head-pose comparison plots
pub mod plot;

/// Clip cutting and cropping
pub mod snippet;

/// Coordinate rotation
pub mod rotation;

/// Tracking runs behind the body-pose and head-pose tools
pub mod app;

/// Output naming and small geometry helpers
pub mod utils;

pub use error::{Error, Result};

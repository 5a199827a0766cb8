//! Output naming and small geometry helpers shared by the tools.

pub mod image_conversion;
pub mod safe_cast;

use crate::{
    constants::{BODY_POSE_SUFFIX, COMPARISON_SEPARATOR, COMPARISON_SUFFIX, HEAD_POSE_SUFFIX, ROTATED_SUFFIX},
    Result,
};
use opencv::core::Rect;
use safe_cast::f32_to_i32_clamp;
use std::path::{Path, PathBuf};

/// Files produced by one tracking run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Annotated video
    pub video: PathBuf,
    /// Landmark track table
    pub track: PathBuf,
}

fn file_stem(input: &Path) -> String {
    input
        .file_stem()
        .map_or_else(|| "output".to_string(), |s| s.to_string_lossy().into_owned())
}

/// `<stem>__bodypose.<ext>` and `<stem>__bodypose.csv` in `output_dir`
#[must_use]
pub fn body_pose_outputs(input: &Path, output_dir: &Path) -> OutputPaths {
    let stem = file_stem(input);
    let ext = input
        .extension()
        .map_or_else(|| "avi".to_string(), |e| e.to_string_lossy().into_owned());
    OutputPaths {
        video: output_dir.join(format!("{stem}{BODY_POSE_SUFFIX}.{ext}")),
        track: output_dir.join(format!("{stem}{BODY_POSE_SUFFIX}.csv")),
    }
}

/// `<stem>_headpose<.ext>` and `<stem>_headpose.csv` in `output_dir`.
/// An input without extension gives a video without extension.
#[must_use]
pub fn head_pose_outputs(input: &Path, output_dir: &Path) -> OutputPaths {
    let stem = file_stem(input);
    let ext = input
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    OutputPaths {
        video: output_dir.join(format!("{stem}{HEAD_POSE_SUFFIX}{ext}")),
        track: output_dir.join(format!("{stem}{HEAD_POSE_SUFFIX}.csv")),
    }
}

/// Comparison plot file name: base names joined by `__vs__`, then `__headpose.png`
#[must_use]
pub fn comparison_plot_name<P: AsRef<Path>>(inputs: &[P]) -> String {
    let names: Vec<String> = inputs.iter().map(|p| file_stem(p.as_ref())).collect();
    format!("{}{COMPARISON_SUFFIX}", names.join(COMPARISON_SEPARATOR))
}

/// `<stem>__rotated.csv` beside the input
#[must_use]
pub fn rotated_track_path(input: &Path) -> PathBuf {
    input.with_file_name(format!("{}{ROTATED_SUFFIX}.csv", file_stem(input)))
}

/// Expand bounding boxes by `shift` of their size, make them square and keep
/// them inside the image
///
/// # Errors
///
/// Currently returns Ok(()) always, but returns Result for API consistency
#[allow(clippy::cast_precision_loss)] // Precision loss acceptable for box dimensions
pub fn refine_boxes(boxes: &mut [Rect], max_width: i32, max_height: i32, shift: f32) -> Result<()> {
    for bbox in boxes.iter_mut() {
        let x_shift = f32_to_i32_clamp(bbox.width as f32 * shift, 0, max_width);
        let y_shift = f32_to_i32_clamp(bbox.height as f32 * shift, 0, max_height);

        bbox.x = (bbox.x - x_shift).max(0);
        bbox.y = (bbox.y - y_shift).max(0);
        bbox.width = (bbox.width + 2 * x_shift).min(max_width - bbox.x);
        bbox.height = (bbox.height + 2 * y_shift).min(max_height - bbox.y);

        // Square, but never larger than the image
        let side_length = bbox.width.max(bbox.height).min(max_width).min(max_height);
        bbox.width = side_length;
        bbox.height = side_length;

        if bbox.x + bbox.width > max_width {
            bbox.x = max_width - bbox.width;
        }
        if bbox.y + bbox.height > max_height {
            bbox.y = max_height - bbox.height;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_pose_outputs() {
        let out = body_pose_outputs(Path::new("/videos/webcam/test_distance.avi"), Path::new("/out"));
        assert_eq!(out.video, PathBuf::from("/out/test_distance__bodypose.avi"));
        assert_eq!(out.track, PathBuf::from("/out/test_distance__bodypose.csv"));
    }

    #[test]
    fn test_body_pose_outputs_with_dots_in_name() {
        let out = body_pose_outputs(Path::new("take.2.mp4"), Path::new("out"));
        assert_eq!(out.video, PathBuf::from("out/take.2__bodypose.mp4"));
    }

    #[test]
    fn test_head_pose_outputs() {
        let out = head_pose_outputs(Path::new("clips/test_1min_1p.avi"), Path::new("out"));
        assert_eq!(out.video, PathBuf::from("out/test_1min_1p_headpose.avi"));
        assert_eq!(out.track, PathBuf::from("out/test_1min_1p_headpose.csv"));

        let bare = head_pose_outputs(Path::new("clip"), Path::new("out"));
        assert_eq!(bare.video, PathBuf::from("out/clip_headpose"));
    }

    #[test]
    fn test_comparison_plot_name() {
        let inputs = [
            PathBuf::from("/of/test_distance_webcam.csv"),
            PathBuf::from("/of/test_distance_absolute_webcam.csv"),
        ];
        assert_eq!(
            comparison_plot_name(&inputs),
            "test_distance_webcam__vs__test_distance_absolute_webcam__headpose.png"
        );
        assert_eq!(comparison_plot_name(&["a.csv"]), "a__headpose.png");
    }

    #[test]
    fn test_rotated_track_path() {
        assert_eq!(
            rotated_track_path(Path::new("/out/run__bodypose.csv")),
            PathBuf::from("/out/run__bodypose__rotated.csv")
        );
    }

    #[test]
    fn test_refine_boxes_square_and_inside() {
        let mut boxes = vec![Rect::new(10, 10, 50, 30), Rect::new(190, 190, 20, 20), Rect::new(0, 0, 10, 10)];

        refine_boxes(&mut boxes, 200, 200, 0.5).unwrap();

        for bbox in &boxes {
            assert_eq!(bbox.width, bbox.height);
            assert!(bbox.x >= 0 && bbox.y >= 0);
            assert!(bbox.x + bbox.width <= 200);
            assert!(bbox.y + bbox.height <= 200);
        }
        assert!(boxes[0].width > 50);
    }

    #[test]
    fn test_refine_boxes_larger_than_image() {
        let mut boxes = vec![Rect::new(0, 0, 300, 100)];
        refine_boxes(&mut boxes, 120, 100, 0.1).unwrap();
        assert_eq!(boxes[0].width, 100);
        assert_eq!(boxes[0].x + boxes[0].width <= 120, true);
    }
}

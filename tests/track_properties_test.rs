//! Properties of the landmark track builder: one row per frame, zero fill
//! before the first detection, exact carry-forward afterwards.

mod test_helpers;

use mocap_pipeline::{
    landmarks::{LandmarkLayout, BODY_POSE, HEAD_POSE},
    track::{DenseMatrix, NoObserver, RowOrigin, TrackBuilder},
};
use proptest::prelude::*;
use test_helpers::{value_set, Script, ScriptedSource, ValueDetector};

fn track(layout: LandmarkLayout, script: Script) -> DenseMatrix {
    let mut source = ScriptedSource::new(script);
    TrackBuilder::new(layout)
        .process(&mut source, &mut ValueDetector::new(layout), &mut NoObserver)
        .unwrap()
}

fn flat(layout: &LandmarkLayout, v: u32) -> Vec<f64> {
    layout.flatten(&value_set(layout, v)).unwrap()
}

/// A frame read: detection with value 1..=9, no subject (0), or a decode failure
fn frame_read() -> impl Strategy<Value = Option<u32>> {
    prop_oneof![
        3 => (1u32..10).prop_map(Some),
        1 => Just(Some(0u32)),
        1 => Just(None),
    ]
}

#[test]
fn test_alternating_failures_carry_forward() {
    // A, fail, B, fail, fail
    let matrix = track(BODY_POSE, vec![Some(1), Some(0), Some(2), None, Some(0)]);
    let a = flat(&BODY_POSE, 1);
    let b = flat(&BODY_POSE, 2);

    let rows: Vec<Vec<f64>> = matrix.values().rows().into_iter().map(|r| r.to_vec()).collect();
    assert_eq!(rows, vec![a.clone(), a, b.clone(), b.clone(), b]);
    assert_eq!(
        matrix.origins(),
        &[
            RowOrigin::Detected,
            RowOrigin::CarriedForward,
            RowOrigin::Detected,
            RowOrigin::CarriedForward,
            RowOrigin::CarriedForward,
        ]
    );
}

#[test]
fn test_no_detection_gives_zero_matrix() {
    let matrix = track(BODY_POSE, vec![Some(0); 10]);
    assert_eq!(matrix.values().dim(), (10, 99));
    assert!(matrix.values().iter().all(|&v| v == 0.0));
    assert_eq!(matrix.summary().zero_filled, 10);
}

#[test]
fn test_row_widths() {
    assert_eq!(flat(&BODY_POSE, 3).len(), 99);
    assert_eq!(flat(&HEAD_POSE, 3).len(), 18);
    assert_eq!(track(HEAD_POSE, vec![Some(1), None]).width(), 18);
}

#[test]
fn test_body_rows_are_index_ascending() {
    let row = flat(&BODY_POSE, 5);
    for (i, point) in row.chunks_exact(3).enumerate() {
        assert_eq!(point, &[5.0, i as f64, -5.0]);
    }
}

#[test]
fn test_head_rows_follow_pnp_order() {
    let row = flat(&HEAD_POSE, 1);
    let landmark_ids: Vec<f64> = row.chunks_exact(3).map(|p| p[1]).collect();
    assert_eq!(landmark_ids, vec![30.0, 8.0, 36.0, 45.0, 48.0, 54.0]);
}

#[test]
fn test_empty_stream() {
    let matrix = track(BODY_POSE, Vec::new());
    assert!(matrix.is_empty());
    assert_eq!(matrix.width(), 99);
}

proptest! {
    #[test]
    fn prop_one_row_per_frame(script in prop::collection::vec(frame_read(), 0..40)) {
        let n = script.len();
        let matrix = track(BODY_POSE, script);
        prop_assert_eq!(matrix.rows(), n);
        prop_assert_eq!(matrix.frame_indices().to_vec(), (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn prop_zero_rows_before_first_detection(k in 0usize..15, v in 1u32..10, tail in prop::collection::vec(frame_read(), 0..10)) {
        let mut script: Script = (0..k).map(|i| if i % 2 == 0 { Some(0) } else { None }).collect();
        script.push(Some(v));
        script.extend(tail);

        let matrix = track(BODY_POSE, script);
        for i in 0..k {
            prop_assert!(matrix.row(i).iter().all(|&x| x == 0.0));
        }
        prop_assert_eq!(matrix.row(k).to_vec(), flat(&BODY_POSE, v));
    }

    #[test]
    fn prop_failures_repeat_last_detection(prefix in prop::collection::vec(frame_read(), 0..10), v in 1u32..10, misses in prop::collection::vec(prop_oneof![Just(Some(0u32)), Just(None::<u32>)], 1..10)) {
        let start = prefix.len();
        let m = misses.len();
        let mut script = prefix;
        script.push(Some(v));
        script.extend(misses);

        let matrix = track(BODY_POSE, script);
        let expected = flat(&BODY_POSE, v);
        for i in start..=start + m {
            prop_assert_eq!(matrix.row(i).to_vec(), expected.clone());
        }
    }

    #[test]
    fn prop_rows_have_layout_width(script in prop::collection::vec(frame_read(), 1..20)) {
        for layout in [BODY_POSE, HEAD_POSE] {
            let matrix = track(layout, script.clone());
            prop_assert_eq!(matrix.width(), layout.width());
            prop_assert_eq!(matrix.values().row(0).len(), layout.width());
        }
    }

    #[test]
    fn prop_truncated_stream_is_not_padded(script in prop::collection::vec((1u32..10).prop_map(Some), 1..30), declared_extra in 0usize..10) {
        // The container claims more frames than the stream delivers
        let n = script.len();
        let mut source = ScriptedSource::with_declared(n + declared_extra, script);
        let matrix = TrackBuilder::new(BODY_POSE)
            .process(&mut source, &mut ValueDetector::new(BODY_POSE), &mut NoObserver)
            .unwrap();
        prop_assert_eq!(matrix.rows(), n);
    }
}

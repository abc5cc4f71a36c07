use super::*;

#[test]
fn one_second_at_30fps_has_30_frames() {
    let s = FrameSchedule::new(1000, 30.0).unwrap();
    assert_eq!(s.len(), 30);
    assert_eq!(s.timestamp(FrameIndex(0)), Some(0.0));
    assert!((s.timestamp(FrameIndex(1)).unwrap() - 33.333).abs() < 0.01);
    assert!((s.timestamp(FrameIndex(2)).unwrap() - 66.667).abs() < 0.01);
    assert!((s.timestamp(FrameIndex(29)).unwrap() - 966.667).abs() < 0.01);
    assert_eq!(s.timestamp(FrameIndex(30)), None);
}

#[test]
fn fifteen_seconds_at_30fps_has_450_frames() {
    let s = FrameSchedule::new(15_000, 30.0).unwrap();
    assert_eq!(s.len(), 450);
    assert!((s.duration_secs() - 15.0).abs() < 1e-9);
}

#[test]
fn count_matches_ceil_formula_over_grid() {
    let durations = [1u64, 7, 33, 100, 999, 1000, 1001, 2500, 15_000];
    let rates = [1.0, 3.0, 12.5, 23.976, 24.0, 29.97, 30.0, 60.0, 120.0];
    for &d in &durations {
        for &r in &rates {
            let s = FrameSchedule::new(d, r).unwrap();
            let exact = d as f64 * r / 1000.0;
            let expected = if (exact - exact.round()).abs() < 1e-9 {
                exact.round() as u64
            } else {
                exact.ceil() as u64
            };
            assert_eq!(s.len(), expected, "duration={d} rate={r}");

            let ts = s.timestamps_ms();
            assert_eq!(ts[0], 0.0);
            for w in ts.windows(2) {
                assert!(w[1] > w[0], "not strictly increasing for {d}/{r}");
                assert!((w[1] - w[0] - s.interval_ms()).abs() < 1e-6);
            }
            assert!(*ts.last().unwrap() < d as f64);
        }
    }
}

#[test]
fn exact_products_do_not_gain_a_frame() {
    assert_eq!(FrameSchedule::new(1000, 3.0).unwrap().len(), 3);
    assert_eq!(FrameSchedule::new(1000, 0.1 * 3.0 * 10.0).unwrap().len(), 3);
}

#[test]
fn short_duration_still_captures_first_frame() {
    let s = FrameSchedule::new(1, 30.0).unwrap();
    assert_eq!(s.len(), 1);
    assert_eq!(s.timestamps_ms(), &[0.0]);
}

#[test]
fn identical_inputs_yield_identical_schedules() {
    let a = FrameSchedule::new(4321, 29.97).unwrap();
    let b = FrameSchedule::new(4321, 29.97).unwrap();
    assert_eq!(a, b);
}

#[test]
fn iter_pairs_indices_with_timestamps() {
    let s = FrameSchedule::new(100, 30.0).unwrap();
    let pairs: Vec<_> = s.iter().collect();
    assert_eq!(pairs.len(), 3);
    for (i, (idx, t)) in pairs.iter().enumerate() {
        assert_eq!(idx.0, i as u64);
        assert_eq!(Some(*t), s.timestamp(*idx));
    }
}

#[test]
fn rejects_non_positive_inputs() {
    for (d, r) in [(0u64, 30.0), (1000, 0.0), (1000, -1.0), (1000, f64::NAN), (1000, f64::INFINITY)]
    {
        let err = FrameSchedule::new(d, r).unwrap_err();
        assert!(
            matches!(err, FramecastError::InvalidScheduleParameters(_)),
            "duration={d} rate={r}"
        );
    }
}

#[test]
fn oversized_schedules_are_rejected_before_allocating() {
    for (d, r) in [(1u64, 1e300), (u64::MAX, 30.0), (1000, f64::MAX)] {
        let err = FrameSchedule::new(d, r).unwrap_err();
        assert!(
            matches!(err, FramecastError::InvalidScheduleParameters(_)),
            "duration={d} rate={r}"
        );
        assert!(err.to_string().contains("maximum"), "{err}");
    }

    // One frame past the cap fails; the cap itself is allowed.
    assert!(FrameSchedule::new(MAX_FRAMES + 1, 1000.0).is_err());
    assert_eq!(FrameSchedule::new(MAX_FRAMES, 1000.0).unwrap().len(), MAX_FRAMES);
}

use ppe_track::{
    ComplianceState, Detection, EngineError, FrameDetections, Observations, RawObservation,
    TrackerConfig, TrackingEngine,
};

fn engine(detection_interval: u32, min_hits: u32, max_age: u32) -> TrackingEngine {
    TrackingEngine::new(TrackerConfig {
        detection_interval,
        min_hits,
        max_age,
        iou_threshold: 0.3,
        ppe_items: vec!["helmet".into(), "uniform".into()],
        ..Default::default()
    })
    .unwrap()
}

fn person(x: f32) -> Detection {
    Detection::new(x, 100.0, x + 60.0, 260.0, 0.9)
}

fn obs(pairs: &[(&str, RawObservation)]) -> Observations {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn test_occlusion_keeps_last_verdict() {
    let mut engine = engine(1, 1, 30);

    for frame in 0..=31u64 {
        let report = engine
            .process_frame(frame, FrameDetections::Ready(vec![person(100.0)]), |_, _| {
                match frame {
                    10 => Some(obs(&[("helmet", RawObservation::Compliant)])),
                    11..=31 => Some(obs(&[("helmet", RawObservation::Unknown)])),
                    _ => None,
                }
            })
            .unwrap();

        let status = report.track(1).unwrap().ppe_status.get("helmet");
        if frame < 10 {
            assert_eq!(status, Some(ComplianceState::Unknown));
        } else {
            assert_eq!(status, Some(ComplianceState::Compliant), "frame {frame}");
        }
    }
}

#[test]
fn test_confident_observation_overrides() {
    let mut engine = engine(1, 1, 30);
    let both = || FrameDetections::Ready(vec![person(0.0), person(400.0)]);

    for frame in 0..=5u64 {
        engine
            .process_frame(frame, both(), |id, _| {
                (id == 2 && frame == 5).then(|| obs(&[("uniform", RawObservation::Compliant)]))
            })
            .unwrap();
    }
    assert_eq!(
        engine.report(5).track(2).unwrap().ppe_status.get("uniform"),
        Some(ComplianceState::Compliant)
    );

    let report = engine
        .process_frame(6, both(), |id, _| {
            (id == 2).then(|| obs(&[("uniform", RawObservation::NonCompliant)]))
        })
        .unwrap();
    assert_eq!(
        report.track(2).unwrap().ppe_status.get("uniform"),
        Some(ComplianceState::NonCompliant)
    );
    assert_eq!(
        report.track(1).unwrap().ppe_status.get("uniform"),
        Some(ComplianceState::Unknown)
    );
}

#[test]
fn test_detector_gap_predicts_without_touching_counters() {
    let mut engine = engine(5, 3, 10);

    for frame in 0..=20u64 {
        let detections = if engine.is_detection_frame(frame) {
            FrameDetections::Ready(vec![person(100.0 + 2.0 * frame as f32)])
        } else {
            FrameDetections::Skipped
        };
        engine.process_frame(frame, detections, |_, _| None).unwrap();
    }

    let after_detection = engine.tracks().get(1).unwrap().clone();
    assert!(after_detection.is_confirmed());
    let mut last_cx = after_detection.bbox().cx;

    for frame in 21..=24u64 {
        assert!(!engine.is_detection_frame(frame));
        let report = engine
            .process_frame(frame, FrameDetections::Skipped, |_, _| None)
            .unwrap();

        assert_eq!(report.active_tracks, 1);
        let reported = report.track(1).unwrap();
        assert!(reported.bbox.cx > last_cx, "frame {frame} box is stale");
        last_cx = reported.bbox.cx;

        let track = engine.tracks().get(1).unwrap();
        assert_eq!(track.hits, after_detection.hits);
        assert_eq!(track.age_since_update, after_detection.age_since_update);
        assert_eq!(track.state, after_detection.state);
    }
}

#[test]
fn test_new_identity_reported_from_third_match() {
    let mut engine = engine(1, 3, 10);

    for frame in 0..2u64 {
        let report = engine
            .process_frame(frame, FrameDetections::Ready(vec![person(100.0)]), |_, _| None)
            .unwrap();
        assert_eq!(report.active_tracks, 0);
        assert!(report.compliance_status.is_empty());
    }

    let report = engine
        .process_frame(2, FrameDetections::Ready(vec![person(100.0)]), |_, _| None)
        .unwrap();
    assert_eq!(report.active_tracks, 1);
    assert_eq!(report.compliance_status[0].track_id, 1);
}

#[test]
fn test_interrupted_matches_do_not_confirm() {
    let mut engine = engine(1, 3, 10);
    let seen = |frame: u64| frame % 2 == 0;

    for frame in 0..=4u64 {
        let detections = if seen(frame) { vec![person(100.0)] } else { vec![] };
        let report = engine
            .process_frame(frame, FrameDetections::Ready(detections), |_, _| None)
            .unwrap();
        assert_eq!(report.active_tracks, 0, "frame {frame}");
    }
    assert_eq!(engine.tracks().get(1).unwrap().hits, 3);

    // Two more uninterrupted matches complete a streak of three.
    let report = engine
        .process_frame(5, FrameDetections::Ready(vec![person(100.0)]), |_, _| None)
        .unwrap();
    assert_eq!(report.active_tracks, 0);
    let report = engine
        .process_frame(6, FrameDetections::Ready(vec![person(100.0)]), |_, _| None)
        .unwrap();
    assert_eq!(report.active_tracks, 1);
    assert_eq!(report.compliance_status[0].track_id, 1);
}

#[test]
fn test_identity_deleted_after_max_age_misses() {
    let mut engine = engine(1, 1, 10);

    for frame in 0..5u64 {
        engine
            .process_frame(frame, FrameDetections::Ready(vec![person(100.0)]), |_, _| None)
            .unwrap();
    }

    // Only an unrelated person is detected from now on.
    for miss in 1..=15u64 {
        let frame = 4 + miss;
        let report = engine
            .process_frame(frame, FrameDetections::Ready(vec![person(900.0)]), |_, _| None)
            .unwrap();
        if miss <= 10 {
            assert!(report.track(1).is_some(), "missing after {miss} misses");
        } else {
            assert!(report.track(1).is_none(), "reported after {miss} misses");
            assert!(engine.tracks().get(1).is_none());
        }
    }
}

#[test]
fn test_ids_not_reused_after_deletion() {
    let mut engine = engine(1, 1, 1);
    engine
        .process_frame(0, FrameDetections::Ready(vec![person(100.0)]), |_, _| None)
        .unwrap();
    engine
        .process_frame(1, FrameDetections::Ready(vec![]), |_, _| None)
        .unwrap();
    let report = engine
        .process_frame(2, FrameDetections::Ready(vec![]), |_, _| None)
        .unwrap();
    assert_eq!(report.active_tracks, 0);

    let report = engine
        .process_frame(3, FrameDetections::Ready(vec![person(100.0)]), |_, _| None)
        .unwrap();
    assert_eq!(report.compliance_status[0].track_id, 2);
}

#[test]
fn test_frames_must_increase() {
    let mut engine = engine(1, 1, 10);
    engine
        .process_frame(10, FrameDetections::Skipped, |_, _| None)
        .unwrap();
    let err = engine
        .process_frame(9, FrameDetections::Ready(vec![person(0.0)]), |_, _| None)
        .unwrap_err();
    assert_eq!(err, EngineError::OutOfOrderFrame { previous: 10, got: 9 });
    // The rejected frame changed nothing.
    assert!(engine.tracks().is_empty());
    assert_eq!(engine.last_frame(), Some(10));
}

#[test]
fn test_degenerate_detection_never_becomes_a_track() {
    let mut engine = engine(1, 1, 10);
    let report = engine
        .process_frame(
            0,
            FrameDetections::Ready(vec![
                Detection::new(50.0, 50.0, 50.0, 200.0, 0.9),
                Detection::new(f32::NAN, 0.0, 10.0, 10.0, 0.9),
            ]),
            |_, _| None,
        )
        .unwrap();
    assert_eq!(report.active_tracks, 0);
    assert!(engine.tracks().is_empty());
}

#[test]
fn test_report_json_is_ordered() {
    let mut engine = engine(1, 1, 10);
    let report = engine
        .process_frame(
            0,
            FrameDetections::Ready(vec![person(500.0), person(0.0)]),
            |id, _| {
                (id == 2).then(|| obs(&[("uniform", RawObservation::Compliant)]))
            },
        )
        .unwrap();

    let json = serde_json::to_string(&report).unwrap();
    assert_eq!(
        json,
        concat!(
            r#"{"frame_number":0,"active_tracks":2,"compliance_status":["#,
            r#"{"track_id":1,"ppe_status":{"helmet":"UNKNOWN","uniform":"UNKNOWN"}},"#,
            r#"{"track_id":2,"ppe_status":{"helmet":"UNKNOWN","uniform":"COMPLIANT"}}"#,
            r#"]}"#
        )
    );
}

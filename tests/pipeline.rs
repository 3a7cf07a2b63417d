use chrono::{DateTime, Duration, TimeZone, Utc};
use image::RgbImage;
use qwatch::bbox::BBox;
use qwatch::behavior::Behavior;
use qwatch::detector::{DetectionsRecord, ReplayDetector};
use qwatch::effects::{AlertSink, JsonLinesSink, SideEffect};
use qwatch::geometry;
use qwatch::track::HISTORY_CAPACITY;
use qwatch::{AlertKind, AlertType, Config, Detection, Detector, Engine, Error, Zone};
use serde_json::json;
use std::collections::VecDeque;

/// Detector playing back a fixed script; `None` entries simulate a failure.
struct Script {
    frames: VecDeque<Option<Vec<Detection>>>,
}

impl Script {
    fn new<I: IntoIterator<Item = Option<Vec<Detection>>>>(frames: I) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    fn repeat(frame: Vec<Detection>, n: usize) -> Self {
        Self::new(std::iter::repeat(Some(frame)).take(n))
    }
}

impl Detector for Script {
    fn detect(&mut self, _frame: &RgbImage, _threshold: f32) -> Result<Vec<Detection>, Error> {
        match self.frames.pop_front() {
            Some(Some(dets)) => Ok(dets),
            Some(None) => Err(Error::DetectorError("inference crashed".to_string())),
            None => Ok(Vec::new()),
        }
    }
}

fn person(id: i32, x: f32, y: f32) -> Detection {
    Detection::new(Some(id), BBox::ltrb(x - 15.0, y - 40.0, x + 15.0, y + 40.0), 0, 0.9)
}

fn at(h: u32, m: u32, offset_ms: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap() + Duration::milliseconds(offset_ms)
}

fn frame() -> RgbImage {
    RgbImage::new(640, 480)
}

fn vault() -> Zone {
    Zone::new(
        vec![[100.0, 100.0], [300.0, 100.0], [300.0, 300.0], [100.0, 300.0]],
        "Vault",
    )
}

#[test]
fn history_stays_bounded_and_ordered() {
    let script = (0..180).map(|i| Some(vec![person(3, 50.0 + (i % 7) as f32 * 30.0, 240.0)]));
    let mut engine = Engine::new(Script::new(script), Config::default());

    for i in 0..180 {
        engine.process_frame_at(frame(), at(12, 0, i * 100));

        let track = engine.tracks().get(3).unwrap();
        assert!(track.len() <= HISTORY_CAPACITY);
        assert!(track.direction_changes <= track.hits_count);

        let ts: Vec<f64> = track.timestamps().collect();
        assert!(ts.windows(2).all(|w| w[0] <= w[1]));
    }

    assert_eq!(engine.tracks().get(3).unwrap().len(), HISTORY_CAPACITY);
}

#[test]
fn motionless_person_loiters_once_per_cooldown() {
    let config = Config {
        loitering_threshold: 5.0,
        ..Config::default()
    };
    let mut engine = Engine::new(Script::repeat(vec![person(7, 320.0, 240.0)], 40), config);
    let mut loitering = Vec::new();

    // one frame every 500ms for 20s
    for i in 0..40 {
        let out = engine.process_frame_at(frame(), at(12, 0, i * 500));
        for alert in out.alerts {
            if alert.alert_type() == AlertType::Loitering {
                loitering.push((i, alert.suspicion_score));
            }
        }
    }

    // duration first exceeds 5s at frame 11, the next window opens 10s later
    assert_eq!(loitering.len(), 2);
    assert_eq!(loitering[0], (11, 2.0));
    assert_eq!(loitering[1].0, 31);
}

#[test]
fn intrusion_at_centroid_reports_zone() {
    let centre = geometry::centroid(&vault().polygon()).unwrap();
    let config = Config {
        intrusion_zones: vec![
            Zone {
                active: false,
                ..Zone::new(vec![[0.0, 0.0], [640.0, 0.0], [640.0, 480.0], [0.0, 480.0]], "Lot")
            },
            vault(),
        ],
        ..Config::default()
    };
    let mut engine = Engine::new(
        Script::repeat(vec![person(2, centre.x, centre.y)], 1),
        config,
    );

    let out = engine.process_frame_at(frame(), at(12, 0, 0));

    assert_eq!(out.alerts.len(), 1);
    assert_eq!(
        out.alerts[0].kind,
        AlertKind::ZoneIntrusion {
            zone_id: 1,
            zone_name: "Vault".to_string()
        }
    );
    assert_eq!(out.alerts[0].location, [centre.x, centre.y]);
    assert!(out.annotated);
}

#[test]
fn inactive_zone_never_fires() {
    let centre = geometry::centroid(&vault().polygon()).unwrap();
    let config = Config {
        intrusion_zones: vec![Zone {
            active: false,
            ..vault()
        }],
        ..Config::default()
    };
    let mut engine = Engine::new(
        Script::repeat(vec![person(2, centre.x, centre.y)], 3),
        config,
    );

    for i in 0..3 {
        assert!(engine.process_frame_at(frame(), at(12, 0, i * 1000)).alerts.is_empty());
    }
}

#[test]
fn quiet_period_blocks_overnight_only() {
    let config = Config {
        intrusion_zones: vec![vault()],
        quiet_period_enabled: true,
        quiet_period_start: "22:00".to_string(),
        quiet_period_end: "06:00".to_string(),
        ..Config::default()
    };

    for (h, expect_alert) in [(23, false), (3, false), (12, true)] {
        let mut engine = Engine::new(
            Script::repeat(vec![person(1, 200.0, 200.0)], 1),
            config.clone(),
        );
        let out = engine.process_frame_at(frame(), at(h, 0, 0));

        assert_eq!(!out.alerts.is_empty(), expect_alert, "at {:02}:00", h);
        if !expect_alert {
            assert_eq!(engine.suspicion_score(1), 0.0);
        }
    }
}

#[test]
fn loitering_and_pacing_together_are_high_risk() {
    // oscillates 20px every second: a direction change per frame, but tight
    // enough to count as standing still
    let script: Vec<_> = (0..15)
        .map(|i| Some(vec![person(5, if i % 2 == 0 { 200.0 } else { 220.0 }, 400.0)]))
        .collect();
    let mut engine = Engine::new(Script::new(script), Config::default());
    let mut outputs = Vec::new();

    for i in 0..15 {
        outputs.push(engine.process_frame_at(frame(), at(12, 0, i * 1000)));
    }

    // pacing alone at t=4, then the identity is cooling down until t=14
    let types_at = |i: usize| -> Vec<AlertType> {
        outputs[i].alerts.iter().map(|a| a.alert_type()).collect()
    };
    assert_eq!(types_at(4), vec![AlertType::Pacing]);
    assert!((5..14).all(|i| outputs[i].alerts.is_empty()));

    let last = &outputs[14].alerts;
    assert_eq!(
        last.iter().map(|a| a.alert_type()).collect::<Vec<_>>(),
        vec![AlertType::Loitering, AlertType::Pacing, AlertType::HighRisk]
    );
    assert!(last[0].suspicion_score < 5.0);
    assert!(last[1].suspicion_score < 5.0);
    assert_eq!(
        last[2].kind,
        AlertKind::HighRisk {
            behaviors: vec![Behavior::Loitering, Behavior::Pacing]
        }
    );
    assert_eq!(last[2].suspicion_score, last[1].suspicion_score);

    let sounds: Vec<_> = outputs[14]
        .effects
        .iter()
        .filter_map(|e| match e {
            SideEffect::PlaySound(t) => Some(*t),
            _ => None,
        })
        .collect();
    assert_eq!(sounds, vec![AlertType::HighRisk]);
    assert_eq!(engine.tracks().get(5).unwrap().direction_changes, 0);
}

#[test]
fn scores_keep_decaying_without_detections() {
    let mut script = vec![Some(vec![person(1, 200.0, 200.0)])];
    script.extend((0..99).map(|_| Some(Vec::new())));
    let config = Config {
        intrusion_zones: vec![vault()],
        stale_track_seconds: 0.0,
        ..Config::default()
    };
    let mut engine = Engine::new(Script::new(script), config);

    for i in 0..100 {
        engine.process_frame_at(frame(), at(12, 0, i * 100));
    }

    let expected = 3.0 * 0.99f32.powi(100);
    assert!((engine.suspicion_score(1) - expected).abs() < 1e-4);
}

#[test]
fn detector_failure_skips_frame_and_recovers() {
    let config = Config {
        intrusion_zones: vec![vault()],
        ..Config::default()
    };
    let script = vec![None, Some(vec![person(1, 200.0, 200.0)])];
    let mut engine = Engine::new(Script::new(script), config);
    let input = RgbImage::from_pixel(640, 480, image::Rgb([9, 9, 9]));

    let failed = engine.process_frame_at(input.clone(), at(12, 0, 0));
    assert!(failed.alerts.is_empty());
    assert!(!failed.annotated);
    assert_eq!(failed.frame, input);

    let ok = engine.process_frame_at(input.clone(), at(12, 0, 100));
    assert_eq!(ok.alerts.len(), 1);
    assert_ne!(ok.frame, input);
}

#[test]
fn config_update_applies_from_next_frame() {
    let mut engine = Engine::new(
        Script::repeat(vec![person(1, 200.0, 200.0)], 2),
        Config::default(),
    );

    assert!(engine.process_frame_at(frame(), at(12, 0, 0)).alerts.is_empty());

    engine.update_config(&json!({
        "intrusion_zones": [{"points": [[100, 100], [300, 100], [300, 300], [100, 300]], "name": "Vault"}],
        "not_a_setting": 1
    }));

    let out = engine.process_frame_at(frame(), at(12, 0, 100));
    assert_eq!(out.alerts.len(), 1);
    assert_eq!(engine.config().version(), 1);
}

#[test]
fn alert_log_accumulates_across_frames() {
    let config = Config {
        intrusion_zones: vec![vault()],
        ..Config::default()
    };
    let script = vec![
        Some(vec![person(1, 200.0, 200.0), person(2, 250.0, 250.0)]),
        Some(vec![person(3, 150.0, 150.0)]),
    ];
    let mut engine = Engine::new(Script::new(script), config);

    engine.process_frame_at(frame(), at(12, 0, 0));
    engine.process_frame_at(frame(), at(12, 0, 100));

    let log = engine.alerts();
    assert_eq!(log.len(), 3);
    let ids: Vec<i32> = log.recent(2).iter().map(|a| a.track_id).collect();
    assert_eq!(ids, vec![2, 3]);

    let first = log.iter().next().unwrap().id;
    assert!(engine.alerts_mut().remove(first));
    assert_eq!(engine.alerts().len(), 2);
}

#[test]
fn scene_summary_describes_last_frame() {
    let mut engine = Engine::new(
        Script::repeat(vec![person(1, 50.0, 240.0)], 1),
        Config::default(),
    );

    assert!(engine.scene_summary().is_none());
    engine.process_frame_at(frame(), at(12, 0, 0));

    assert_eq!(
        engine.scene_summary().as_deref(),
        Some("Scene Summary: 1 person sitting in the left.")
    );
}

#[test]
fn replay_prints_every_alert_of_a_long_recording() {
    let config = Config {
        intrusion_zones: vec![vault()],
        ..Config::default()
    };
    // a new identity in the vault every frame, well past any queue depth
    let records: Vec<DetectionsRecord> = (0..400)
        .map(|i| DetectionsRecord {
            timestamp_ms: 1_700_000_000_000 + i as u64 * 40,
            detections: vec![person(i, 200.0, 200.0)],
        })
        .collect();
    let mut engine = Engine::new(ReplayDetector::from_records(&records), config);

    let mut buf = Vec::new();
    let mut sink = JsonLinesSink::new(&mut buf);
    let mut frames = 0;

    engine
        .replay(&records, 320, 240, |idx, output| {
            assert_eq!(idx, frames);
            frames += 1;
            for alert in &output.alerts {
                sink.deliver(alert)?;
            }
            Ok(())
        })
        .unwrap();
    drop(sink);

    let printed: Vec<serde_json::Value> = String::from_utf8(buf)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(frames, 400);
    assert_eq!(printed.len(), 400);
    assert_eq!(printed.len(), engine.alerts().len());
    assert_eq!(printed[399]["track_id"], 399);
    assert!(printed.iter().all(|a| a["type"] == "intrusion"));
}

#[test]
fn malformed_quiet_period_is_ignored_not_fatal() {
    let config = Config {
        intrusion_zones: vec![vault()],
        quiet_period_enabled: true,
        quiet_period_start: "ten pm".to_string(),
        ..Config::default()
    };
    let mut engine = Engine::new(Script::repeat(vec![person(1, 200.0, 200.0)], 1), config);

    let out = engine.process_frame_at(frame(), at(23, 0, 0));

    assert_eq!(out.alerts.len(), 1);
    assert!(engine.quiet_period_error().unwrap().contains("ten pm"));

    engine.update_config(&json!({"quiet_period_start": "22:00"}));
    engine.process_frame_at(frame(), at(23, 0, 100));
    assert!(engine.quiet_period_error().is_none());
}

//! # Integration Tests
//!
//! 跨 crate 的场景测试与端到端测试。
//!
//! 负责：
//! - 规则引擎 + 告警生命周期的组合场景 (闯红灯、超速、逆行)
//! - 会话端到端：配置加载 -> 回放 -> 取证 -> 告警分发
//! - 订阅端隔离：慢速或失败的 sink 不影响其他订阅者

#[cfg(test)]
mod support {
    use std::sync::Arc;

    use contracts::{BBox, Frame, ImageData, TrackedObject};
    use dispatcher::{AlertManager, LifecycleConfig};
    use observability::FrameMetrics;

    pub const W: u32 = 1000;
    pub const H: u32 = 1000;

    pub fn make_frame(index: u64, timestamp: f64) -> Frame {
        Frame {
            index,
            timestamp,
            image: ImageData::blank(W, H),
        }
    }

    /// 20x20 car centred on (cx, cy)
    pub fn car(track_id: u64, cx: f64, cy: f64) -> TrackedObject {
        TrackedObject::new(
            BBox::new(cx - 10.0, cy - 10.0, cx + 10.0, cy + 10.0),
            Some(track_id),
            "car",
        )
    }

    pub fn make_manager() -> AlertManager {
        AlertManager::new(LifecycleConfig::default(), Arc::new(FrameMetrics::default()))
    }
}

#[cfg(test)]
mod rule_scenarios {
    use contracts::{
        Alert, LineSegment, Point, RoiConfig, RuleEngineConfig, SignalState, ViolationEvent,
        ViolationKind,
    };
    use dispatcher::AlertManager;
    use rule_engine::{Classifiers, RuleEngine};

    use crate::support::{car, make_frame, make_manager};

    /// Evaluate one frame and push every event through the alert manager
    fn step(
        engine: &mut RuleEngine,
        manager: &AlertManager,
        index: u64,
        ts: f64,
        objects: &[contracts::TrackedObject],
        signal: SignalState,
    ) -> Vec<Alert> {
        let frame = make_frame(index, ts);
        let mut classifiers = Classifiers::none();
        let evaluation = engine.evaluate(&frame, objects, signal, &mut classifiers);
        evaluation
            .events
            .into_iter()
            .filter_map(|event| manager.emit(event, Some(&frame), ts))
            .collect()
    }

    #[test]
    fn test_cooldown_boundary() {
        let manager = make_manager();
        let event = ViolationEvent::new(ViolationKind::SignalCrossing, Some(3));

        assert!(manager.emit(event.clone(), None, 0.0).is_some());
        assert!(manager.emit(event.clone(), None, 4.9).is_none());
        assert!(manager.emit(event, None, 5.1).is_some());
        assert_eq!(manager.log_len(), 2);
    }

    #[test]
    fn test_red_light_scenario() {
        let roi = RoiConfig {
            stop_line: Some(LineSegment::new(Point::new(0.3, 0.8), Point::new(0.7, 0.8))),
            ..Default::default()
        };
        let mut engine = RuleEngine::new(roi, RuleEngineConfig::default());
        let manager = make_manager();
        let red = SignalState::Red;

        // approaching: 50 px short of the line
        assert!(step(&mut engine, &manager, 0, 0.0, &[car(1, 500.0, 750.0)], red).is_empty());

        let alerts = step(&mut engine, &manager, 1, 0.1, &[car(1, 500.0, 800.0)], red);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, ViolationKind::SignalCrossing);
        assert_eq!(alerts[0].track_id, Some(1));
        assert_eq!(alerts[0].vehicle_class.as_deref(), Some("car"));

        // still on the line two seconds later: debounced
        assert!(step(&mut engine, &manager, 2, 2.0, &[car(1, 500.0, 800.0)], red).is_empty());

        // outside the cooldown window: new alert
        let alerts = step(&mut engine, &manager, 3, 6.0, &[car(1, 500.0, 800.0)], red);
        assert_eq!(alerts.len(), 1);

        assert_eq!(manager.log_len(), 2);
        assert!(manager.is_highlighted(1, 6.0));
        // only wrong-way alerts take focus
        assert!(manager.focus(6.0).is_none());
    }

    #[test]
    fn test_green_light_never_alerts() {
        let roi = RoiConfig {
            stop_line: Some(LineSegment::new(Point::new(0.3, 0.8), Point::new(0.7, 0.8))),
            ..Default::default()
        };
        let mut engine = RuleEngine::new(roi, RuleEngineConfig::default());
        let manager = make_manager();

        for i in 0..10u64 {
            let alerts = step(
                &mut engine,
                &manager,
                i,
                i as f64 * 0.1,
                &[car(1, 500.0, 800.0)],
                SignalState::Green,
            );
            assert!(alerts.is_empty());
        }
        assert_eq!(manager.log_len(), 0);
    }

    #[test]
    fn test_speed_scenario() {
        // 300 px across the calibration segment = 10 m
        let calibrated = RoiConfig {
            speed_calib_points: Some(LineSegment::new(Point::new(0.1, 0.5), Point::new(0.4, 0.5))),
            speed_calib_distance_m: Some(10.0),
            ..Default::default()
        };

        for (limit, expected) in [(40.0, 0), (30.0, 1)] {
            let roi = RoiConfig {
                speed_limit_kmh: Some(limit),
                ..calibrated.clone()
            };
            let mut engine = RuleEngine::new(roi, RuleEngineConfig::default());
            let manager = make_manager();
            let green = SignalState::Green;

            step(&mut engine, &manager, 0, 0.0, &[car(4, 250.0, 500.0)], green);
            // 30 px in 0.1 s = 1 m / 0.1 s = 36 km/h
            let alerts = step(&mut engine, &manager, 1, 0.1, &[car(4, 250.0, 470.0)], green);

            let speeding: Vec<&Alert> = alerts
                .iter()
                .filter(|a| a.kind == ViolationKind::Speeding)
                .collect();
            assert_eq!(speeding.len(), expected, "limit {limit}");
            if let Some(alert) = speeding.first() {
                let kmh = alert.info["speed_kmh"].as_f64().unwrap();
                assert!((kmh - 36.0).abs() < 0.05);
            }
        }
    }

    #[test]
    fn test_speed_rule_needs_calibration() {
        let roi = RoiConfig {
            speed_limit_kmh: Some(10.0),
            ..Default::default()
        };
        let mut engine = RuleEngine::new(roi, RuleEngineConfig::default());
        let manager = make_manager();

        step(&mut engine, &manager, 0, 0.0, &[car(4, 250.0, 500.0)], SignalState::Green);
        let alerts = step(&mut engine, &manager, 1, 0.1, &[car(4, 250.0, 400.0)], SignalState::Green);
        assert!(alerts.is_empty());
    }

    /// Left half travels up, right half travels down
    fn two_lane_roi() -> RoiConfig {
        RoiConfig {
            lanes: vec![
                vec![
                    Point::new(0.0, 0.0),
                    Point::new(0.5, 0.0),
                    Point::new(0.5, 0.9),
                    Point::new(0.0, 0.9),
                ],
                vec![
                    Point::new(0.5, 0.0),
                    Point::new(1.0, 0.0),
                    Point::new(1.0, 0.9),
                    Point::new(0.5, 0.9),
                ],
            ],
            lane_directions: vec![
                LineSegment::new(Point::new(0.25, 0.9), Point::new(0.25, 0.1)),
                LineSegment::new(Point::new(0.75, 0.1), Point::new(0.75, 0.9)),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_wrong_way_alert_then_reset() {
        let mut engine = RuleEngine::new(two_lane_roi(), RuleEngineConfig::default());
        let manager = make_manager();

        // moving down in the up lane at 100 px/s
        let mut wrong_way = Vec::new();
        for i in 0..20u64 {
            let obj = car(8, 250.0, 100.0 + 10.0 * i as f64);
            let alerts = step(&mut engine, &manager, i, i as f64 * 0.1, &[obj], SignalState::Green);
            wrong_way.extend(alerts.into_iter().filter(|a| a.kind == ViolationKind::WrongWay));
        }
        // one alert per cooldown window even though the counter keeps growing
        assert_eq!(wrong_way.len(), 1);
        assert!(engine.wrong_way_count(8).unwrap() >= 10);
        assert_eq!(manager.focus(1.9), Some(8));

        // leaving every lane resets the counter
        step(&mut engine, &manager, 20, 2.0, &[car(8, 250.0, 960.0)], SignalState::Green);
        assert_eq!(engine.wrong_way_count(8), Some(0));
    }

    #[test]
    fn test_alert_log_keeps_latest_200() {
        let manager = make_manager();
        for i in 0..1000u64 {
            let event = ViolationEvent::new(ViolationKind::LaneExit, Some(i));
            assert!(manager.emit(event, None, i as f64 * 0.01).is_some());
        }

        let alerts = manager.recent_alerts();
        assert_eq!(alerts.len(), 200);
        assert_eq!(alerts[0].track_id, Some(999));
        assert_eq!(alerts[199].track_id, Some(800));
    }
}

#[cfg(test)]
mod learning_scenarios {
    use contracts::{LearningConfig, Point, RoiConfig};
    use rule_engine::{DirectionEstimator, DirectionPhase, PixelRoi, Vector2};

    use crate::support::{H, W};

    fn one_lane() -> PixelRoi {
        let roi = RoiConfig {
            lanes: vec![vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
                Point::new(0.0, 1.0),
            ]],
            ..Default::default()
        };
        PixelRoi::from_config(&roi, W, H)
    }

    #[test]
    fn test_median_ignores_outliers() {
        let mut estimator = DirectionEstimator::new(&one_lane(), true, 0, LearningConfig::default());

        // 70% travel up with a little lateral jitter, 30% perpendicular noise
        for i in 0..70 {
            let jitter = (i % 5) as f64 - 2.0;
            assert!(estimator.offer(0, Vector2::new(jitter, -100.0)));
        }
        for _ in 0..30 {
            assert!(estimator.offer(0, Vector2::new(100.0, 0.0)));
        }

        assert_eq!(estimator.phase(0), Some(DirectionPhase::Learning));
        estimator.end_of_frame(60);
        assert_eq!(estimator.phase(0), Some(DirectionPhase::Converged));
        assert!(estimator.learning_complete());

        let d = estimator.direction(0).unwrap();
        assert!(d.x.abs() < 0.05, "x = {}", d.x);
        assert!((d.y + 1.0).abs() < 0.01, "y = {}", d.y);
    }

    #[test]
    fn test_slow_samples_rejected() {
        let mut estimator = DirectionEstimator::new(&one_lane(), true, 0, LearningConfig::default());
        assert!(!estimator.offer(0, Vector2::new(0.0, -5.0)));
        assert_eq!(estimator.sample_count(0), 0);
    }
}

#[cfg(test)]
mod session_e2e {
    use std::thread;
    use std::time::{Duration, Instant};

    use config_loader::{collect_warnings, ConfigFormat, ConfigLoader};
    use contracts::{FrameSource, Point, SignalState, ViolationKind};
    use dispatcher::{create_dispatcher, FileEvidenceStore};
    use ingestion::{MockScene, ScriptedTrack};
    use rule_engine::Classifiers;
    use session::Session;

    const SITE: &str = r#"
[site]
name = "junction-e2e"
nominal_fps = 10.0

[roi]
stop_line = [[0.0, 0.5], [1.0, 0.5]]

[session]
pacing_factor = 0.0

[[sinks]]
name = "viewer"
sink_type = "broadcast"
"#;

    fn wait_finished(session: &Session) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!session.is_running());
    }

    /// Car parked on the stop line; the signal turns red at frame 10
    fn red_at_ten() -> MockScene {
        MockScene::new(100, 100, 10.0, 30)
            .with_track(ScriptedTrack::new(1, "car", Point::new(50.0, 50.0)).sized(10.0, 10.0))
            .with_signal(10, SignalState::Red)
    }

    #[test]
    fn test_replay_to_evidence() {
        let dir = tempfile::tempdir().unwrap();
        let mut blueprint = ConfigLoader::load_from_str(SITE, ConfigFormat::Toml).unwrap();
        blueprint.evidence.base_dir = dir.path().to_path_buf();
        assert!(collect_warnings(&blueprint).is_empty());

        let mut session = Session::from_blueprint(&blueprint).unwrap();
        let control = session.signal_control();
        let (source, tracker) = red_at_ten().to_log().split();
        let source = source.with_signal_hook(move |state| control.set(state));

        session
            .start(
                move || Ok(Box::new(source) as Box<dyn FrameSource>),
                Box::new(tracker),
                Classifiers::none(),
            )
            .unwrap();
        wait_finished(&session);

        let feed = session.recent_alerts();
        assert_eq!(feed.signal, SignalState::Red);
        assert_eq!(feed.alerts.len(), 1);
        let alert = &feed.alerts[0];
        assert_eq!(alert.kind, ViolationKind::SignalCrossing);
        assert!((alert.ts - 1.0).abs() < 1e-9);

        let evidence_id = alert.evidence_id.clone().unwrap();
        let store = FileEvidenceStore::new(&blueprint.evidence).unwrap();
        let record = store.load(&evidence_id).unwrap();
        assert_eq!(record.violation_type, ViolationKind::SignalCrossing);
        assert_eq!(record.track_id, Some(1));
        assert!(dir.path().join(&record.crop_path).exists());
        assert!(dir.path().join(&record.frame_path).exists());

        let metrics = session.metrics();
        assert_eq!(metrics.violations.get("signal_crossing"), Some(&1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_session_feeds_broadcast_viewer() {
        let mut blueprint = ConfigLoader::load_from_str(SITE, ConfigFormat::Toml).unwrap();
        blueprint.evidence.enabled = false;

        let mut session = Session::from_blueprint(&blueprint).unwrap();
        let dispatcher = create_dispatcher(blueprint.sinks.clone(), session.subscribe()).unwrap();
        let mut viewer = dispatcher.subscribe("viewer").unwrap();
        let dispatcher_task = dispatcher.spawn();

        let control = session.signal_control();
        let (source, tracker) = red_at_ten().to_log().split();
        let source = source.with_signal_hook(move |state| control.set(state));
        session
            .start(
                move || Ok(Box::new(source) as Box<dyn FrameSource>),
                Box::new(tracker),
                Classifiers::none(),
            )
            .unwrap();

        let alert = tokio::time::timeout(Duration::from_secs(5), viewer.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alert.kind, ViolationKind::SignalCrossing);
        assert_eq!(alert.track_id, Some(1));
        assert!(alert.evidence_id.is_none());

        tokio::task::block_in_place(|| {
            wait_finished(&session);
            assert!(session.stop());
        });
        drop(session);
        tokio::time::timeout(Duration::from_secs(5), dispatcher_task)
            .await
            .unwrap()
            .unwrap();
    }
}

#[cfg(test)]
mod subscriber_isolation {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{Alert, AlertSink, ContractError, ViolationEvent, ViolationKind};
    use dispatcher::{Dispatcher, SinkHandle};

    use crate::support::make_manager;

    struct ScriptedSink {
        name: String,
        written: Arc<AtomicU64>,
        delay: Duration,
        fail: bool,
    }

    impl ScriptedSink {
        fn new(name: &str, delay_ms: u64, fail: bool) -> (Self, Arc<AtomicU64>) {
            let written = Arc::new(AtomicU64::new(0));
            let sink = Self {
                name: name.to_string(),
                written: Arc::clone(&written),
                delay: Duration::from_millis(delay_ms),
                fail,
            };
            (sink, written)
        }
    }

    impl AlertSink for ScriptedSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, _alert: &Alert) -> Result<(), ContractError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(ContractError::sink_write(&self.name, "scripted failure"));
            }
            self.written.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_slow_and_failing_sinks_are_isolated() {
        let manager = make_manager();

        let (fast, fast_written) = ScriptedSink::new("fast", 0, false);
        let (slow, slow_written) = ScriptedSink::new("slow", 10, false);
        let (broken, _) = ScriptedSink::new("broken", 0, true);
        let handles = vec![
            SinkHandle::spawn(fast, 64),
            SinkHandle::spawn(slow, 1),
            SinkHandle::spawn(broken, 64),
        ];
        let dispatcher = Dispatcher::with_handles(handles, manager.subscribe());
        let counters = dispatcher.metrics_handles();
        let task = dispatcher.spawn();

        // emission never waits on subscribers
        for i in 0..50u64 {
            let event = ViolationEvent::new(ViolationKind::Speeding, Some(i));
            assert!(manager.emit(event, None, i as f64).is_some());
        }
        assert_eq!(manager.log_len(), 50);

        drop(manager);
        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .unwrap()
            .unwrap();

        let snapshot = |name: &str| {
            counters
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, m)| m.snapshot())
                .unwrap()
        };

        assert_eq!(fast_written.load(Ordering::Relaxed), 50);
        assert_eq!(snapshot("fast").dropped, 0);

        let slow = snapshot("slow");
        assert!(slow.dropped > 0);
        assert_eq!(slow.delivered + slow.dropped, 50);
        assert_eq!(slow_written.load(Ordering::Relaxed), slow.delivered);

        let broken = snapshot("broken");
        assert_eq!(broken.failed, 50);
        assert_eq!(broken.delivered, 0);
    }
}

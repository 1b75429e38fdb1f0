//! Violation rule evaluator.
//!
//! Two phases per frame:
//! 1. classify: class filter, centroid and lane membership for every object
//! 2. rules, per object in fixed order: signal crossing, wrong-way,
//!    lane exit, speeding, no-helmet, plate read
//!
//! The evaluator produces raw [`ViolationEvent`]s; debouncing, evidence and
//! the alert log belong to the lifecycle manager.

use contracts::{
    BBox, Frame, Point, RoiConfig, RuleEngineConfig, SignalState, TrackedObject, ViolationEvent,
    ViolationKind,
};
use nalgebra::Vector2;
use observability::{record_active_tracks, record_direction_update, record_tracks_evicted};
use tracing::{debug, info, instrument, warn};

use crate::classifiers::Classifiers;
use crate::direction::{DirectionEstimator, DirectionPhase};
use crate::geometry::{line_crossed, speed_kmh, PixelRoi};
use crate::history::TrackTable;

/// Classes examined by the helmet classifier
pub const RIDER_CLASSES: [&str; 2] = ["motorcycle", "bicycle"];

/// Seconds between idle-track sweeps
const EVICTION_INTERVAL_S: f64 = 1.0;

/// One object after classification, with the rule labels it earned this frame
#[derive(Debug, Clone, PartialEq)]
pub struct TrackObservation {
    pub object: TrackedObject,
    pub centroid: Point,
    /// First containing lane, configuration order
    pub lane: Option<usize>,
    /// Fired rule labels in evaluation order (RED LIGHT, WRONG WAY, ...)
    pub labels: Vec<String>,
}

/// Output of one frame
#[derive(Debug, Clone, Default)]
pub struct FrameEvaluation {
    pub events: Vec<ViolationEvent>,
    pub observations: Vec<TrackObservation>,
}

/// Geometry and direction state fixed by the first frame of a session
#[derive(Debug)]
struct Scene {
    roi: PixelRoi,
    directions: DirectionEstimator,
}

/// Stateful per-session rule evaluator
#[derive(Debug)]
pub struct RuleEngine {
    roi_config: RoiConfig,
    config: RuleEngineConfig,
    scene: Option<Scene>,
    tracks: TrackTable,
    last_eviction: Option<f64>,
    /// Frames evaluated this session, 1-based once the first frame is seen
    processed_frames: u64,
}

impl RuleEngine {
    pub fn new(roi_config: RoiConfig, config: RuleEngineConfig) -> Self {
        if roi_config.speed_limit_kmh.is_some() && !roi_config.speed_rule_configured() {
            warn!("Speed limit configured without calibration, speed rule disabled");
        }
        let tracks = TrackTable::new(config.wrong_way.history_capacity);
        Self {
            roi_config,
            config,
            scene: None,
            tracks,
            last_eviction: None,
            processed_frames: 0,
        }
    }

    /// Evaluate all rules for one frame
    ///
    /// The ROI is converted to pixels on the first call using this frame's
    /// size and kept for the rest of the session. Classifier and learning
    /// cadences count evaluated frames, not source indices.
    #[instrument(
        level = "trace",
        name = "rule_engine_evaluate",
        skip(self, frame, objects, classifiers),
        fields(frame_index = frame.index, objects = objects.len())
    )]
    pub fn evaluate(
        &mut self,
        frame: &Frame,
        objects: &[TrackedObject],
        signal: SignalState,
        classifiers: &mut Classifiers,
    ) -> FrameEvaluation {
        self.ensure_scene(frame);
        self.processed_frames += 1;

        let mut evaluation = FrameEvaluation {
            events: Vec::new(),
            observations: self.classify(objects),
        };

        for observation in &mut evaluation.observations {
            let events = self.evaluate_object(frame, observation, signal, classifiers);
            evaluation.events.extend(events);
        }

        self.end_of_frame(frame);
        evaluation
    }

    fn ensure_scene(&mut self, frame: &Frame) {
        if self.scene.is_some() {
            return;
        }
        let roi = PixelRoi::from_config(&self.roi_config, frame.width(), frame.height());
        let learn = self.roi_config.learns_directions();
        let directions = DirectionEstimator::new(
            &roi,
            learn,
            self.roi_config.auto_lane_warmup_frames,
            self.config.learning.clone(),
        );
        info!(
            width = frame.width(),
            height = frame.height(),
            lanes = roi.lanes.len(),
            stop_line = roi.stop_line.is_some(),
            speed_rule = roi.speed_rule().is_some(),
            auto_direction = learn,
            "ROI converted to pixel space"
        );
        self.scene = Some(Scene { roi, directions });
    }

    /// Phase 1: class filter and lane membership
    fn classify(&self, objects: &[TrackedObject]) -> Vec<TrackObservation> {
        let Some(scene) = self.scene.as_ref() else {
            return Vec::new();
        };
        let allowed = &self.roi_config.classes;

        objects
            .iter()
            .filter(|o| allowed.is_empty() || allowed.iter().any(|c| *c == o.class_name))
            .map(|object| {
                let centroid = object.bbox.centroid();
                TrackObservation {
                    object: object.clone(),
                    centroid,
                    lane: scene.roi.lane_of(centroid),
                    labels: Vec::new(),
                }
            })
            .collect()
    }

    /// Phase 2: rules for one object
    fn evaluate_object(
        &mut self,
        frame: &Frame,
        observation: &mut TrackObservation,
        signal: SignalState,
        classifiers: &mut Classifiers,
    ) -> Vec<ViolationEvent> {
        let Self {
            config,
            scene,
            tracks,
            processed_frames,
            ..
        } = self;
        let processed = *processed_frames;
        let Some(Scene { roi, directions }) = scene.as_mut() else {
            return Vec::new();
        };

        let now = frame.timestamp;
        let object = &observation.object;
        let bbox = object.bbox;
        let class_name = object.class_name.as_str();
        let centroid = observation.centroid;
        let lane = observation.lane;
        let is_vehicle = config.is_vehicle(class_name);

        let mut track = match object.track_id {
            Some(id) => Some((id, tracks.get_or_insert(id, now))),
            None => None,
        };

        // first sighting of a vehicle: try to read its plate once
        let mut plate = None;
        if let Some((track_id, (state, true))) = track.as_mut() {
            if is_vehicle {
                plate = classifiers.read_plate(frame, &bbox);
                if let Some(text) = &plate {
                    info!(track_id = *track_id, plate = %text, "Plate read on first sighting");
                    state.plate = Some(text.clone());
                }
            }
        }

        let mut fired: Vec<(ViolationEvent, String)> = Vec::new();
        let violation = |kind| {
            ViolationEvent::new(kind, object.track_id)
                .with_bbox(bbox)
                .with_vehicle_class(class_name)
        };

        // 1. signal crossing
        if signal == SignalState::Red {
            if let Some(stop_line) = &roi.stop_line {
                if line_crossed(centroid, stop_line, config.line_tolerance_px) {
                    let event = violation(ViolationKind::SignalCrossing)
                        .with_info("cx", centroid.x.trunc() as i64)
                        .with_info("cy", centroid.y.trunc() as i64);
                    fired.push((event, "RED LIGHT".to_string()));
                }
            }
        }

        // 2. lane containment + wrong-way
        if let Some((track_id, (state, _))) = track.as_mut() {
            match lane {
                None => state.wrong_way_count = 0,
                Some(lane) => {
                    let ww = &config.wrong_way;
                    state.history.push(now, centroid);

                    if let Some(velocity) = state.history.velocity(ww.min_history, ww.min_span_s) {
                        let speed = velocity.norm();
                        if is_vehicle {
                            directions.offer(lane, velocity);
                        }

                        let opposing = directions.direction(lane).is_some_and(|d| {
                            speed >= ww.min_speed_pxps
                                && velocity.dot(&d) < -ww.opposite_factor * speed
                        });
                        if opposing {
                            state.wrong_way_count += 1;
                        } else {
                            state.wrong_way_count = 0;
                        }

                        if state.wrong_way_count >= ww.threshold_frames {
                            debug!(
                                track_id = *track_id,
                                lane,
                                count = state.wrong_way_count,
                                "Sustained opposite-direction motion"
                            );
                            let event = violation(ViolationKind::WrongWay)
                                .with_info("lane", lane)
                                .with_info("speed_pxps", round1(speed));
                            fired.push((event, "WRONG WAY".to_string()));
                        }
                    }
                }
            }
        }

        // 3. lane exit
        if lane.is_none() && roi.has_lanes() {
            let event = violation(ViolationKind::LaneExit)
                .with_info("cx", centroid.x.trunc() as i64)
                .with_info("cy", centroid.y.trunc() as i64);
            fired.push((event, "LANE VIOLATION".to_string()));
        }

        // 4. speeding
        if let Some((_, (state, _))) = track.as_mut() {
            if let Some((meters_per_pixel, limit)) = roi.speed_rule() {
                if let Some((t0, p0)) = state.last_position {
                    let dt = now - t0;
                    if dt > config.speed.min_dt_s {
                        let kmh = speed_kmh(centroid.distance(p0), meters_per_pixel, dt);
                        if kmh > limit {
                            let event = violation(ViolationKind::Speeding)
                                .with_info("speed_kmh", round1(kmh))
                                .with_info("limit_kmh", limit);
                            fired.push((event, format!("SPEED {kmh:.0}")));
                        }
                    }
                }
            }
            state.last_position = Some((now, centroid));
        }

        // 5. no helmet
        let cadence = &config.classifiers;
        if RIDER_CLASSES.contains(&class_name)
            && every(processed, cadence.helmet_every)
            && classifiers.no_helmet(frame, &head_region(&bbox, cadence.head_fraction))
        {
            fired.push((violation(ViolationKind::NoHelmet), "NO HELMET".to_string()));
        }

        if let Some(text) = &plate {
            for (event, _) in &mut fired {
                event.info.insert("plate".to_string(), text.clone().into());
            }
        }

        // 6. periodic plate read (informational)
        if is_vehicle && every(processed, cadence.plate_every) {
            if let Some(text) = classifiers.read_plate(frame, &bbox) {
                if let Some((_, (state, _))) = track.as_mut() {
                    state.plate = Some(text.clone());
                }
                let event =
                    ViolationEvent::new(ViolationKind::PlateRead, object.track_id).with_info("text", text.clone());
                fired.push((event, text));
            }
        }

        let (events, labels): (Vec<_>, Vec<_>) = fired.into_iter().unzip();
        observation.labels = labels;
        events
    }

    fn end_of_frame(&mut self, frame: &Frame) {
        let now = frame.timestamp;
        let processed = self.processed_frames;

        if let Some(scene) = self.scene.as_mut() {
            for lane in scene.directions.end_of_frame(processed) {
                record_direction_update(lane);
            }
            if let Some(progress) = scene.directions.progress(processed) {
                metrics::gauge!("lanewatch_direction_learning_progress").set(f64::from(progress));
            }
        }

        let due = self
            .last_eviction
            .map_or(true, |last| now - last >= EVICTION_INTERVAL_S || now < last);
        if due {
            let evicted = self
                .tracks
                .evict_idle(now, self.config.track_idle_timeout_s);
            if evicted > 0 {
                debug!(evicted, remaining = self.tracks.len(), "Evicted idle tracks");
            }
            record_tracks_evicted(evicted);
            record_active_tracks(self.tracks.len());
            self.last_eviction = Some(now);
        }
    }

    /// Forget all per-session state (tracks, geometry, learned directions)
    pub fn reset(&mut self) {
        self.scene = None;
        self.tracks.clear();
        self.last_eviction = None;
        self.processed_frames = 0;
    }

    /// Warm-up percentage while direction learning is incomplete
    pub fn learning_progress(&self) -> Option<u8> {
        self.scene
            .as_ref()
            .and_then(|s| s.directions.progress(self.processed_frames))
    }

    pub fn learning_complete(&self) -> bool {
        self.scene
            .as_ref()
            .is_some_and(|s| s.directions.learning_complete())
    }

    /// Current unit direction for a lane
    pub fn direction(&self, lane: usize) -> Option<Vector2<f64>> {
        self.scene.as_ref()?.directions.direction(lane)
    }

    pub fn direction_phase(&self, lane: usize) -> Option<DirectionPhase> {
        self.scene.as_ref()?.directions.phase(lane)
    }

    /// Pixel ROI, available after the first frame
    pub fn pixel_roi(&self) -> Option<&PixelRoi> {
        self.scene.as_ref().map(|s| &s.roi)
    }

    /// Frames evaluated since the session started
    pub fn processed_frames(&self) -> u64 {
        self.processed_frames
    }

    pub fn active_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn wrong_way_count(&self, track_id: u64) -> Option<u32> {
        self.tracks.get(track_id).map(|s| s.wrong_way_count)
    }

    /// Last plate read for a track
    pub fn plate(&self, track_id: u64) -> Option<&str> {
        self.tracks.get(track_id)?.plate.as_deref()
    }

    pub fn config(&self) -> &RuleEngineConfig {
        &self.config
    }

    pub fn roi_config(&self) -> &RoiConfig {
        &self.roi_config
    }
}

#[inline]
fn every(processed: u64, n: u64) -> bool {
    n > 0 && processed % n == 0
}

fn head_region(bbox: &BBox, fraction: f64) -> BBox {
    bbox.top_fraction(fraction)
}

/// Round to one decimal place
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

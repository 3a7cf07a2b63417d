use crate::alert::{Alert, AlertKind, AlertLog, AlertType};
use crate::annotate::Annotator;
use crate::behavior::{self, Finding};
use crate::config::{Config, ConfigHandle};
use crate::detection::Detection;
use crate::detector::{Detector, DetectionsRecord};
use crate::error::Error;
use crate::effects::SideEffect;
use crate::gate::AlertGate;
use crate::scene::{self, SceneSummary};
use crate::scorer::{SuspicionScorer, DECAY_FACTOR};
use crate::track::TrackStore;

use chrono::{DateTime, Local, NaiveTime, TimeZone};
use image::RgbImage;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

const TOP_SCORES: usize = 5;

/// Result of one processed frame.
#[derive(Debug, Clone)]
pub struct FrameOutput {
    pub frame: RgbImage,
    pub alerts: Vec<Alert>,
    pub effects: Vec<SideEffect>,
    pub annotated: bool,
}

/// Alerts and side-effect requests produced from one frame's detections.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub alerts: Vec<Alert>,
    pub effects: Vec<SideEffect>,
}

/// Frame pipeline: detections in, alerts, overlay and side-effect requests
/// out. Owns all per-identity state; frames must be fed one at a time.
pub struct Engine<D> {
    detector: D,
    config: ConfigHandle,
    tracks: TrackStore,
    scorer: SuspicionScorer,
    gate: AlertGate,
    log: AlertLog,
    annotator: Annotator,
    last_scene: Option<SceneSummary>,
    frames_processed: u64,
}

impl<D: Detector> Engine<D> {
    pub fn new(detector: D, config: Config) -> Self {
        Self::with_handle(detector, ConfigHandle::new(config))
    }

    pub fn with_handle(detector: D, config: ConfigHandle) -> Self {
        Self {
            detector,
            config,
            tracks: TrackStore::new(),
            scorer: SuspicionScorer::new(),
            gate: AlertGate::default(),
            log: AlertLog::new(),
            annotator: Annotator::new(),
            last_scene: None,
            frames_processed: 0,
        }
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    #[inline]
    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Takes effect from the next frame on.
    pub fn update_config(&self, patch: &Value) -> Arc<Config> {
        self.config.update(patch)
    }

    #[inline]
    pub fn alerts(&self) -> &AlertLog {
        &self.log
    }

    #[inline]
    pub fn alerts_mut(&mut self) -> &mut AlertLog {
        &mut self.log
    }

    #[inline]
    pub fn tracks(&self) -> &TrackStore {
        &self.tracks
    }

    #[inline]
    pub fn suspicion_score(&self, track_id: i32) -> f32 {
        self.scorer.get(track_id)
    }

    #[inline]
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Set while the configured quiet period cannot be parsed and is ignored.
    pub fn quiet_period_error(&self) -> Option<&str> {
        self.gate.quiet_period_error()
    }

    /// Description of the last frame the detector produced output for.
    pub fn scene_summary(&self) -> Option<String> {
        self.last_scene.as_ref().map(ToString::to_string)
    }

    pub fn process_frame(&mut self, frame: RgbImage) -> FrameOutput {
        self.process_frame_at(frame, Local::now())
    }

    /// Like `process_frame` with an explicit wall-clock time; the quiet
    /// period is evaluated in `now`'s time zone.
    pub fn process_frame_at<Tz: TimeZone>(&mut self, mut frame: RgbImage, now: DateTime<Tz>) -> FrameOutput {
        let config = self.config.snapshot();

        let detections = match self.detector.detect(&frame, config.confidence_threshold) {
            Ok(detections) => detections,
            Err(err) => {
                warn!(%err, "detector failed, frame passed through");
                return FrameOutput {
                    frame,
                    alerts: Vec::new(),
                    effects: Vec::new(),
                    annotated: false,
                };
            }
        };

        let now_sec = now.timestamp_millis() as f64 / 1000.0;
        let analysis = self.process_detections(&detections, &config, now_sec, now.time());

        self.last_scene = Some(scene::summarize(&detections, frame.width(), frame.height()));

        let tracked: Vec<Detection> = detections
            .into_iter()
            .filter(|d| d.is_trackable(config.confidence_threshold))
            .collect();

        let annotated = !tracked.is_empty();
        if annotated {
            self.annotator.annotate(
                &mut frame,
                &tracked,
                &analysis.alerts,
                &config,
                &self.scorer.top(TOP_SCORES),
            );
        }

        FrameOutput {
            frame,
            alerts: analysis.alerts,
            effects: analysis.effects,
            annotated,
        }
    }

    /// Feeds one blank `width`x`height` frame per record through the engine
    /// at the record's local time and hands every output to `on_frame` in
    /// record order. Stops at the first error.
    pub fn replay<F>(
        &mut self,
        records: &[DetectionsRecord],
        width: u32,
        height: u32,
        mut on_frame: F,
    ) -> Result<(), Error>
    where
        F: FnMut(usize, FrameOutput) -> Result<(), Error>,
    {
        for (idx, record) in records.iter().enumerate() {
            let now = i64::try_from(record.timestamp_ms)
                .ok()
                .and_then(|ms| Local.timestamp_millis_opt(ms).single())
                .ok_or_else(|| Error::MalformedRecord {
                    line: idx + 1,
                    reason: format!("timestamp {} out of range", record.timestamp_ms),
                })?;

            let output = self.process_frame_at(RgbImage::new(width, height), now);
            on_frame(idx, output)?;
        }

        Ok(())
    }

    /// Runs everything after detection for one frame: track updates, gate,
    /// behavior detectors, decay and eviction.
    pub fn process_detections(
        &mut self,
        detections: &[Detection],
        config: &Config,
        now_sec: f64,
        time_of_day: NaiveTime,
    ) -> Analysis {
        self.frames_processed += 1;

        let quiet = self.gate.quiet_period_active(config, time_of_day);
        let mut analysis = Analysis::default();

        for det in detections
            .iter()
            .filter(|d| d.is_trackable(config.confidence_threshold))
        {
            let Some(track_id) = det.track_id else {
                continue;
            };

            let (evaluation, location) = {
                let track = self.tracks.update(track_id, det.center(), now_sec);
                if track.is_new() {
                    self.scorer.insert(track_id);
                }

                if quiet || !self.gate.should_process(track_id, now_sec) {
                    continue;
                }

                (
                    behavior::evaluate(track, config, self.scorer.get(track_id)),
                    track.position(),
                )
            };

            if evaluation.is_empty() {
                continue;
            }

            let behaviors = evaluation.behaviors();
            let mut alerts = Vec::with_capacity(evaluation.findings.len() + 1);

            for finding in evaluation.findings {
                let score = self.scorer.increment(track_id, finding.score_delta());

                if let Finding::Pacing { .. } = finding {
                    if let Some(track) = self.tracks.get_mut(track_id) {
                        track.reset_direction_changes();
                    }
                }

                alerts.push(Alert::new(finding.into(), track_id, now_sec, location, score));
            }

            if evaluation.high_risk {
                alerts.push(Alert::new(
                    AlertKind::HighRisk { behaviors },
                    track_id,
                    now_sec,
                    location,
                    self.scorer.get(track_id),
                ));
            }

            self.gate.record(track_id, now_sec);

            if config.audio_alerts {
                let sound = if evaluation.high_risk {
                    Some(AlertType::HighRisk)
                } else {
                    alerts.first().map(Alert::alert_type)
                };

                if let Some(sound) = sound {
                    analysis.effects.push(SideEffect::PlaySound(sound));
                }
            }

            for alert in &alerts {
                info!(
                    alert_type = alert.alert_type().as_str(),
                    track_id,
                    score = alert.suspicion_score,
                    "alert"
                );
                analysis.effects.push(SideEffect::Notify(alert.clone()));
            }

            self.log.extend(alerts.iter().cloned());
            analysis.alerts.extend(alerts);
        }

        self.scorer.decay_all(DECAY_FACTOR);

        if config.stale_track_seconds > 0.0 {
            for track_id in self.tracks.evict_stale(now_sec, config.stale_track_seconds) {
                self.scorer.remove(track_id);
                self.gate.forget(track_id);
            }
        }

        analysis
    }
}

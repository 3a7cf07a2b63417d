//! Behavior detectors. Each one is a pure read of a track and the
//! configuration; `evaluate` runs them in order and threads the suspicion
//! score through so later detectors see earlier increments.

use crate::config::Config;
use crate::geometry;
use crate::math;
use crate::track::Track;

use serde_derive::{Deserialize, Serialize};

/// History must hold more than this many samples before loitering is considered.
pub const LOITERING_MIN_SAMPLES: usize = 5;
pub const LOITERING_WINDOW: usize = 10;
/// px², tuned for a 640x480-class camera
pub const LOITERING_MAX_VARIANCE: f32 = 500.0;

pub const LOITERING_SCORE: f32 = 2.0;
pub const PACING_SCORE: f32 = 1.5;
pub const INTRUSION_SCORE: f32 = 3.0;
pub const HIGH_RISK_SCORE: f32 = 5.0;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    Loitering,
    Pacing,
    Intrusion,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    Loitering { duration: f64 },
    Pacing { direction_changes: u32 },
    Intrusion { zone_id: usize, zone_name: String },
}

impl Finding {
    pub fn behavior(&self) -> Behavior {
        match self {
            Finding::Loitering { .. } => Behavior::Loitering,
            Finding::Pacing { .. } => Behavior::Pacing,
            Finding::Intrusion { .. } => Behavior::Intrusion,
        }
    }

    pub fn score_delta(&self) -> f32 {
        match self {
            Finding::Loitering { .. } => LOITERING_SCORE,
            Finding::Pacing { .. } => PACING_SCORE,
            Finding::Intrusion { .. } => INTRUSION_SCORE,
        }
    }
}

pub fn loitering(track: &Track, config: &Config) -> Option<Finding> {
    if track.len() <= LOITERING_MIN_SAMPLES {
        return None;
    }

    let duration = track.duration();
    if duration <= config.loitering_threshold {
        return None;
    }

    let x_var = math::variance(track.recent_positions(LOITERING_WINDOW).map(|p| p.x))?;
    let y_var = math::variance(track.recent_positions(LOITERING_WINDOW).map(|p| p.y))?;

    if x_var < LOITERING_MAX_VARIANCE && y_var < LOITERING_MAX_VARIANCE {
        Some(Finding::Loitering { duration })
    } else {
        None
    }
}

pub fn pacing(track: &Track, config: &Config) -> Option<Finding> {
    if track.direction_changes >= config.pacing_threshold {
        Some(Finding::Pacing {
            direction_changes: track.direction_changes,
        })
    } else {
        None
    }
}

/// At most one intrusion per evaluation: the first containing zone wins.
pub fn intrusion(track: &Track, config: &Config) -> Option<Finding> {
    if !config.zones_enabled || config.intrusion_zones.is_empty() {
        return None;
    }

    let (zone_id, zone) = geometry::containing_zone(track.position(), &config.intrusion_zones)?;

    Some(Finding::Intrusion {
        zone_id,
        zone_name: zone.display_name(zone_id),
    })
}

#[inline]
pub fn is_high_risk(behaviors: &[Behavior], score: f32) -> bool {
    behaviors.len() > 1 || score >= HIGH_RISK_SCORE
}

/// Outcome of running every detector once for one identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evaluation {
    /// Findings in detector order.
    pub findings: Vec<Finding>,
    /// The composite high-risk condition held on the post-increment score.
    pub high_risk: bool,
}

impl Evaluation {
    pub fn behaviors(&self) -> Vec<Behavior> {
        self.findings.iter().map(Finding::behavior).collect()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty() && !self.high_risk
    }
}

/// Loitering, pacing, zone intrusion, then the high-risk composite. `score`
/// is the identity's current score; it is only read, increments are applied
/// by the caller.
pub fn evaluate(track: &Track, config: &Config, score: f32) -> Evaluation {
    let detectors: [fn(&Track, &Config) -> Option<Finding>; 3] = [loitering, pacing, intrusion];

    let findings: Vec<Finding> = detectors
        .iter()
        .filter_map(|detect| detect(track, config))
        .collect();

    let score = score + findings.iter().map(Finding::score_delta).sum::<f32>();
    let behaviors: Vec<Behavior> = findings.iter().map(Finding::behavior).collect();

    Evaluation {
        high_risk: is_high_risk(&behaviors, score),
        findings,
    }
}

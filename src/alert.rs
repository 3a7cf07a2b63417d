use crate::behavior::{Behavior, Finding};

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Loitering,
    Pacing,
    #[serde(rename = "intrusion")]
    ZoneIntrusion,
    HighRisk,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Loitering => "loitering",
            AlertType::Pacing => "pacing",
            AlertType::ZoneIntrusion => "intrusion",
            AlertType::HighRisk => "high_risk",
        }
    }
}

/// Type tag plus the fields specific to that type.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertKind {
    Loitering {
        duration: f64,
    },
    Pacing {
        direction_changes: u32,
    },
    #[serde(rename = "intrusion")]
    ZoneIntrusion {
        zone_id: usize,
        zone_name: String,
    },
    HighRisk {
        behaviors: Vec<Behavior>,
    },
}

impl AlertKind {
    pub fn alert_type(&self) -> AlertType {
        match self {
            AlertKind::Loitering { .. } => AlertType::Loitering,
            AlertKind::Pacing { .. } => AlertType::Pacing,
            AlertKind::ZoneIntrusion { .. } => AlertType::ZoneIntrusion,
            AlertKind::HighRisk { .. } => AlertType::HighRisk,
        }
    }
}

impl From<Finding> for AlertKind {
    fn from(finding: Finding) -> Self {
        match finding {
            Finding::Loitering { duration } => AlertKind::Loitering { duration },
            Finding::Pacing { direction_changes } => AlertKind::Pacing { direction_changes },
            Finding::Intrusion { zone_id, zone_name } => {
                AlertKind::ZoneIntrusion { zone_id, zone_name }
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Alert {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: AlertKind,
    pub track_id: i32,
    /// unix seconds
    pub timestamp: f64,
    pub location: [f32; 2],
    pub suspicion_score: f32,
}

impl Alert {
    pub fn new(
        kind: AlertKind,
        track_id: i32,
        timestamp: f64,
        location: na::Point2<f32>,
        suspicion_score: f32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            track_id,
            timestamp,
            location: [location.x, location.y],
            suspicion_score,
        }
    }

    #[inline]
    pub fn alert_type(&self) -> AlertType {
        self.kind.alert_type()
    }

    #[inline]
    pub fn location(&self) -> na::Point2<f32> {
        na::Point2::new(self.location[0], self.location[1])
    }
}

/// Every alert emitted during the life of the process, oldest first.
#[derive(Debug, Default, Clone)]
pub struct AlertLog {
    alerts: Vec<Alert>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, alert: Alert) {
        self.alerts.push(alert);
    }

    pub fn extend<I: IntoIterator<Item = Alert>>(&mut self, alerts: I) {
        self.alerts.extend(alerts);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Last `limit` alerts, oldest first.
    pub fn recent(&self, limit: usize) -> &[Alert] {
        &self.alerts[self.alerts.len().saturating_sub(limit)..]
    }

    /// Total count plus the requested window.
    pub fn page(&self, offset: usize, limit: usize) -> (usize, &[Alert]) {
        let total = self.alerts.len();
        let start = offset.min(total);
        let end = start.saturating_add(limit).min(total);

        (total, &self.alerts[start..end])
    }

    pub fn get(&self, id: Uuid) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.id == id)
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        match self.alerts.iter().position(|a| a.id == id) {
            Some(idx) => {
                self.alerts.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }
}

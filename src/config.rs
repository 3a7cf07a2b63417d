use crate::error::Error;

use chrono::{NaiveTime, Timelike};
use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

fn default_true() -> bool {
    true
}

/// Named polygonal region used for intrusion testing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Zone {
    pub points: Vec<[f32; 2]>,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Zone {
    pub fn new<S: Into<String>>(points: Vec<[f32; 2]>, name: S) -> Self {
        Self {
            points,
            name: name.into(),
            active: true,
        }
    }

    /// A zone needs at least three vertices to be tested or drawn.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.points.len() >= 3
    }

    pub fn polygon(&self) -> Vec<na::Point2<f32>> {
        self.points
            .iter()
            .map(|[x, y]| na::Point2::new(*x, *y))
            .collect()
    }

    pub fn display_name(&self, idx: usize) -> String {
        if self.name.is_empty() {
            format!("Zone {}", idx)
        } else {
            self.name.clone()
        }
    }
}

/// Parsed time-of-day window. `start > end` wraps over midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietPeriod {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietPeriod {
    pub fn parse(start: &str, end: &str) -> Result<Self, Error> {
        Ok(Self {
            start: parse_time_of_day(start)?,
            end: parse_time_of_day(end)?,
        })
    }

    /// Compared at minute resolution, both bounds inclusive.
    pub fn contains(&self, now: NaiveTime) -> bool {
        let now = NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(now);

        if self.start > self.end {
            now >= self.start || now <= self.end
        } else {
            self.start <= now && now <= self.end
        }
    }
}

fn parse_time_of_day(s: &str) -> Result<NaiveTime, Error> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| Error::InvalidTimeOfDay(s.to_string()))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// seconds a track must be present before loitering is considered
    pub loitering_threshold: f64,
    /// direction changes that make up pacing
    pub pacing_threshold: u32,
    pub intrusion_zones: Vec<Zone>,
    pub zones_enabled: bool,
    pub confidence_threshold: f32,
    pub audio_alerts: bool,
    /// Video source identifier, passed through for the caller.
    pub camera_source: String,
    pub quiet_period_start: String,
    pub quiet_period_end: String,
    pub quiet_period_enabled: bool,
    pub sounds_dir: PathBuf,
    /// Tracks idle for longer than this are evicted; `<= 0` keeps them forever.
    pub stale_track_seconds: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loitering_threshold: 10.0,
            pacing_threshold: 3,
            intrusion_zones: Vec::new(),
            zones_enabled: true,
            confidence_threshold: 0.5,
            audio_alerts: true,
            camera_source: "0".to_string(),
            quiet_period_start: "22:00".to_string(),
            quiet_period_end: "06:00".to_string(),
            quiet_period_enabled: false,
            sounds_dir: PathBuf::from("sounds"),
            stale_track_seconds: 60.0,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;

        Ok(serde_json::from_str(&contents)?)
    }

    /// Returns a copy with the recognized keys of `patch` applied. Unknown
    /// keys are ignored, values that don't fit their key are skipped.
    pub fn merge(&self, patch: &Value) -> Self {
        let mut merged = self.clone();

        let Some(patch) = patch.as_object() else {
            warn!("config update is not a JSON object, ignoring");
            return merged;
        };

        for (key, value) in patch {
            let mut fields = match serde_json::to_value(&merged) {
                Ok(Value::Object(fields)) => fields,
                _ => return merged,
            };

            if !fields.contains_key(key) {
                debug!(%key, "ignoring unknown config key");
                continue;
            }

            fields.insert(key.clone(), value.clone());

            match serde_json::from_value::<Config>(Value::Object(fields)) {
                Ok(next) => merged = next,
                Err(err) => warn!(%key, %err, "ignoring invalid config value"),
            }
        }

        merged
    }

    /// The configured quiet period, `None` when disabled.
    pub fn quiet_period(&self) -> Result<Option<QuietPeriod>, Error> {
        if !self.quiet_period_enabled {
            return Ok(None);
        }

        QuietPeriod::parse(&self.quiet_period_start, &self.quiet_period_end).map(Some)
    }

    /// Zones that take part in intrusion testing.
    pub fn active_zones(&self) -> impl Iterator<Item = (usize, &Zone)> {
        self.intrusion_zones
            .iter()
            .enumerate()
            .filter(|(_, z)| z.active && z.is_valid())
    }
}

/// Shared, versioned configuration. Updates build a new `Config` and swap
/// it in; readers keep whatever snapshot they already hold.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    current: Arc<RwLock<Arc<Config>>>,
    version: Arc<AtomicU64>,
}

impl ConfigHandle {
    pub fn new(config: Config) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    #[inline]
    pub fn snapshot(&self) -> Arc<Config> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn update(&self, patch: &Value) -> Arc<Config> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(current.merge(patch));
        *current = next.clone();
        self.version.fetch_add(1, Ordering::SeqCst);

        next
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn overnight_quiet_period() {
        let period = QuietPeriod::parse("22:00", "06:00").unwrap();

        assert!(period.contains(hm(23, 0)));
        assert!(period.contains(hm(3, 0)));
        assert!(period.contains(hm(22, 0)));
        assert!(period.contains(NaiveTime::from_hms_opt(6, 0, 45).unwrap()));
        assert!(!period.contains(hm(12, 0)));
        assert!(!period.contains(hm(6, 1)));
    }

    #[test]
    fn daytime_quiet_period() {
        let period = QuietPeriod::parse("09:30", "17:00").unwrap();

        assert!(period.contains(hm(9, 30)));
        assert!(period.contains(hm(12, 0)));
        assert!(!period.contains(hm(9, 29)));
        assert!(!period.contains(hm(23, 0)));
    }

    #[test]
    fn invalid_quiet_period_is_inactive() {
        let config = Config {
            quiet_period_enabled: true,
            quiet_period_start: "late".to_string(),
            ..Config::default()
        };

        assert!(matches!(config.quiet_period(), Err(Error::InvalidTimeOfDay(_))));
        assert!(QuietPeriod::parse("25:00", "06:00").is_err());
    }

    #[test]
    fn disabled_quiet_period() {
        assert!(matches!(Config::default().quiet_period(), Ok(None)));
    }

    #[test]
    fn merge_overwrites_known_keys_only() {
        let base = Config::default();
        let merged = base.merge(&json!({
            "loitering_threshold": 4.5,
            "audio_alerts": false,
            "favourite_colour": "teal",
        }));

        assert_eq!(merged.loitering_threshold, 4.5);
        assert!(!merged.audio_alerts);
        assert_eq!(merged.pacing_threshold, base.pacing_threshold);
        assert_eq!(merged.quiet_period_start, "22:00");
    }

    #[test]
    fn merge_skips_invalid_values() {
        let merged = Config::default().merge(&json!({
            "pacing_threshold": "many",
            "zones_enabled": false,
        }));

        assert_eq!(merged.pacing_threshold, 3);
        assert!(!merged.zones_enabled);
    }

    #[test]
    fn merge_replaces_zones_wholesale() {
        let base = Config {
            intrusion_zones: vec![Zone::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]], "Old")],
            ..Config::default()
        };

        let merged = base.merge(&json!({
            "intrusion_zones": [{"points": [[0, 0], [10, 0], [10, 10], [0, 10]], "name": "New"}]
        }));

        assert_eq!(merged.intrusion_zones.len(), 1);
        assert_eq!(merged.intrusion_zones[0].name, "New");
        assert!(merged.intrusion_zones[0].active);
    }

    #[test]
    fn persisted_shape_round_trips() {
        let json = r#"{
            "loitering_threshold": 5,
            "pacing_threshold": 4,
            "intrusion_zones": [{"points": [[100, 100], [300, 100], [300, 300]], "name": "Gate", "active": false}],
            "zones_enabled": true,
            "confidence_threshold": 0.4,
            "audio_alerts": true,
            "quiet_period_start": "23:15",
            "quiet_period_end": "05:45",
            "quiet_period_enabled": true
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.loitering_threshold, 5.0);
        assert_eq!(config.pacing_threshold, 4);
        assert!(!config.intrusion_zones[0].active);
        assert_eq!(config.stale_track_seconds, 60.0);
        assert_eq!(
            config.quiet_period().unwrap(),
            Some(QuietPeriod {
                start: hm(23, 15),
                end: hm(5, 45)
            })
        );
    }

    #[test]
    fn zone_display_name_falls_back_to_index() {
        let zone = Zone::new(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]], "");
        assert_eq!(zone.display_name(2), "Zone 2");
    }

    #[test]
    fn handle_swaps_snapshots() {
        let handle = ConfigHandle::default();
        let before = handle.snapshot();

        let after = handle.update(&json!({"pacing_threshold": 7}));

        assert_eq!(before.pacing_threshold, 3);
        assert_eq!(after.pacing_threshold, 7);
        assert_eq!(handle.snapshot().pacing_threshold, 7);
        assert_eq!(handle.version(), 1);
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!("qwatch-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"pacing_threshold": 9}"#).unwrap();

        let config = Config::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.pacing_threshold, 9);
        assert!(config.zones_enabled);
    }
}

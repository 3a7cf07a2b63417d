use crate::config::Config;

use chrono::NaiveTime;
use std::collections::HashMap;
use tracing::{info, warn};

/// Minimum spacing between alerts for one identity, whatever their type.
pub const COOLDOWN_SECONDS: f64 = 10.0;

/// Decides whether an identity may be evaluated at all this frame.
#[derive(Debug)]
pub struct AlertGate {
    cooldown: f64,
    last_alert: HashMap<i32, f64>,
    quiet: bool,
    quiet_error: Option<String>,
}

impl Default for AlertGate {
    fn default() -> Self {
        Self::new(COOLDOWN_SECONDS)
    }
}

impl AlertGate {
    pub fn new(cooldown: f64) -> Self {
        Self {
            cooldown,
            last_alert: HashMap::new(),
            quiet: false,
            quiet_error: None,
        }
    }

    /// False while the identity is inside its cooldown window.
    pub fn should_process(&self, track_id: i32, now_sec: f64) -> bool {
        match self.last_alert.get(&track_id) {
            Some(last) => now_sec - last >= self.cooldown,
            None => true,
        }
    }

    pub fn record(&mut self, track_id: i32, now_sec: f64) {
        self.last_alert.insert(track_id, now_sec);
    }

    pub fn forget(&mut self, track_id: i32) {
        self.last_alert.remove(&track_id);
    }

    /// Quiet-period check for the frame; logs when the period starts or
    /// ends. A malformed window counts as inactive and is reported once
    /// until the configuration changes.
    pub fn quiet_period_active(&mut self, config: &Config, now: NaiveTime) -> bool {
        let active = match config.quiet_period() {
            Ok(period) => {
                self.quiet_error = None;
                period.map(|p| p.contains(now)).unwrap_or(false)
            }
            Err(err) => {
                let msg = err.to_string();
                if self.quiet_error.as_deref() != Some(msg.as_str()) {
                    warn!(%err, "quiet period disabled");
                    self.quiet_error = Some(msg);
                }
                false
            }
        };

        if active != self.quiet {
            if active {
                info!(%now, "quiet period started, alerts suppressed");
            } else {
                info!(%now, "quiet period ended");
            }
            self.quiet = active;
        }

        active
    }

    /// Why the configured quiet period is being ignored, if it is.
    #[inline]
    pub fn quiet_period_error(&self) -> Option<&str> {
        self.quiet_error.as_deref()
    }
}

use std::path::PathBuf;
use std::str::FromStr;

use crate::engine::AvailabilityPolicy;
use crate::model::{HOUR_MS, Ms};

/// Lifecycle knobs the engine needs at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub policy: AvailabilityPolicy,
    /// Delay between completion and the follow-up notification.
    pub follow_up_delay_ms: Ms,
    /// How long before an accepted window starts the reminder fires. `None` disables reminders.
    pub reminder_lead_ms: Option<Ms>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: AvailabilityPolicy::ClosedWorld,
            follow_up_delay_ms: 24 * HOUR_MS,
            reminder_lead_ms: Some(HOUR_MS),
        }
    }
}

/// Process configuration, read from `ACCORDO_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub dispatch_interval_ms: u64,
    pub compact_threshold: u64,
    pub engine: EngineConfig,
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();
        let policy = match env_parse::<bool>("ACCORDO_OPEN_WORLD") {
            Some(true) => AvailabilityPolicy::OpenWorld,
            _ => AvailabilityPolicy::ClosedWorld,
        };
        // 0 disables reminders.
        let reminder_lead_ms = match env_parse::<Ms>("ACCORDO_REMINDER_LEAD_MS") {
            Some(0) => None,
            Some(lead) => Some(lead),
            None => defaults.reminder_lead_ms,
        };

        Self {
            data_dir: std::env::var("ACCORDO_DATA_DIR")
                .unwrap_or_else(|_| "./data".into())
                .into(),
            metrics_port: env_parse("ACCORDO_METRICS_PORT"),
            dispatch_interval_ms: env_parse("ACCORDO_DISPATCH_INTERVAL_MS").unwrap_or(1000),
            compact_threshold: env_parse("ACCORDO_COMPACT_THRESHOLD").unwrap_or(1000),
            engine: EngineConfig {
                policy,
                follow_up_delay_ms: env_parse("ACCORDO_FOLLOW_UP_DELAY_MS")
                    .unwrap_or(defaults.follow_up_delay_ms),
                reminder_lead_ms,
            },
        }
    }
}

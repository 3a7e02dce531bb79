//! Process configuration, read once from `COURTSIDE_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Optional JSON file with users and courts to provision at startup.
    pub seed: Option<PathBuf>,
    pub venue_offset: FixedOffset,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub reminder_interval: Duration,
    pub reminder_lead: chrono::Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            seed: None,
            venue_offset: FixedOffset::east_opt(7 * 3600).unwrap_or(Utc.fix()),
            compact_threshold: 1000,
            metrics_port: None,
            reminder_interval: Duration::from_secs(120),
            reminder_lead: chrono::Duration::minutes(30),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparseable values fall back to the default with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| -> Option<i64> {
            let raw = lookup(key)?;
            match raw.trim().parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("ignoring {key}={raw:?}: not a number");
                    None
                }
            }
        };

        let venue_offset = parsed("COURTSIDE_UTC_OFFSET_MINUTES")
            .and_then(|m| i32::try_from(m.checked_mul(60)?).ok())
            .and_then(FixedOffset::east_opt)
            .unwrap_or(defaults.venue_offset);

        Self {
            bind: lookup("COURTSIDE_BIND").unwrap_or(defaults.bind),
            port: parsed("COURTSIDE_PORT")
                .and_then(|p| u16::try_from(p).ok())
                .unwrap_or(defaults.port),
            data_dir: lookup("COURTSIDE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            seed: lookup("COURTSIDE_SEED").map(PathBuf::from),
            venue_offset,
            compact_threshold: parsed("COURTSIDE_COMPACT_THRESHOLD")
                .and_then(|n| u64::try_from(n).ok())
                .unwrap_or(defaults.compact_threshold),
            metrics_port: parsed("COURTSIDE_METRICS_PORT").and_then(|p| u16::try_from(p).ok()),
            reminder_interval: parsed("COURTSIDE_REMINDER_INTERVAL_SECS")
                .and_then(|s| u64::try_from(s).ok())
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.reminder_interval),
            reminder_lead: parsed("COURTSIDE_REMINDER_LEAD_MINUTES")
                .filter(|m| *m > 0)
                .map(chrono::Duration::minutes)
                .unwrap_or(defaults.reminder_lead),
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("courtside.journal")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let cfg = from(&[]);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.venue_offset.local_minus_utc(), 7 * 3600);
        assert_eq!(cfg.reminder_interval, Duration::from_secs(120));
        assert_eq!(cfg.reminder_lead, chrono::Duration::minutes(30));
        assert_eq!(cfg.journal_path(), PathBuf::from("./data/courtside.journal"));
        assert!(cfg.seed.is_none());
    }

    #[test]
    fn env_overrides_and_bad_values_fall_back() {
        let cfg = from(&[
            ("COURTSIDE_PORT", "9000"),
            ("COURTSIDE_UTC_OFFSET_MINUTES", "-300"),
            ("COURTSIDE_METRICS_PORT", "9100"),
            ("COURTSIDE_COMPACT_THRESHOLD", "lots"),
            ("COURTSIDE_REMINDER_INTERVAL_SECS", "0"),
        ]);
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.venue_offset.local_minus_utc(), -300 * 60);
        assert_eq!(cfg.metrics_port, Some(9100));
        assert_eq!(cfg.compact_threshold, 1000);
        assert_eq!(cfg.reminder_interval, Duration::from_secs(120));
    }

    #[test]
    fn out_of_range_offset_is_ignored() {
        let cfg = from(&[("COURTSIDE_UTC_OFFSET_MINUTES", "100000")]);
        assert_eq!(cfg.venue_offset.local_minus_utc(), 7 * 3600);
    }
}

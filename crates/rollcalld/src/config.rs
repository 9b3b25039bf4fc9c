//! Daemon configuration.
//!
//! Defaults, overridden by an optional TOML file, overridden by
//! `ROLLCALL_*` environment variables.

use std::path::PathBuf;

use rollcall_core::{PeriodPolicy, ThresholdPolicy};
use serde::Deserialize;

pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Maximum cosine distance for a positive match.
    pub max_distance: f32,
    /// Runner-up margin below which a match is ambiguous.
    pub ambiguity_margin: f32,
    /// Dedup period policy.
    pub period: PeriodPolicy,
    /// Serve on the system bus instead of the session bus.
    pub system_bus: bool,
}

/// Optional config file shape (all keys optional).
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    db_path: Option<PathBuf>,
    max_distance: Option<f32>,
    ambiguity_margin: Option<f32>,
    /// `"daily"` or `"window:<seconds>"`.
    period: Option<String>,
    utc_offset_minutes: Option<i32>,
    system_bus: Option<bool>,
}

impl Config {
    pub fn load() -> Self {
        let file = load_file();

        let db_path = env_path("ROLLCALL_DB_PATH")
            .or(file.db_path)
            .unwrap_or_else(default_db_path);
        let max_distance = env_parse("ROLLCALL_MAX_DISTANCE")
            .or(file.max_distance)
            .unwrap_or(0.60);
        let ambiguity_margin = env_parse("ROLLCALL_AMBIGUITY_MARGIN")
            .or(file.ambiguity_margin)
            .unwrap_or(0.05);
        let utc_offset_minutes = env_parse("ROLLCALL_UTC_OFFSET_MINUTES")
            .or(file.utc_offset_minutes)
            .unwrap_or(0);
        let period_spec = std::env::var("ROLLCALL_PERIOD")
            .ok()
            .or(file.period)
            .unwrap_or_else(|| "daily".to_string());
        let period = PeriodPolicy::parse(&period_spec, utc_offset_minutes).unwrap_or_else(|| {
            tracing::warn!(spec = %period_spec, "bad period spec; falling back to daily");
            PeriodPolicy::CalendarDay { utc_offset_minutes }
        });
        let system_bus = std::env::var("ROLLCALL_SYSTEM_BUS")
            .map(|v| v != "0")
            .ok()
            .or(file.system_bus)
            .unwrap_or(false);

        Self {
            db_path,
            max_distance,
            ambiguity_margin,
            period,
            system_bus,
        }
    }

    pub fn thresholds(&self) -> ThresholdPolicy {
        ThresholdPolicy {
            max_distance: self.max_distance,
            ambiguity_margin: self.ambiguity_margin,
        }
    }
}

/// Read the config file named by `ROLLCALL_CONFIG`, or the default
/// XDG location. Missing file is fine; a malformed one is reported and
/// ignored.
fn load_file() -> FileConfig {
    let path = env_path("ROLLCALL_CONFIG").unwrap_or_else(default_config_path);
    let Ok(raw) = std::fs::read_to_string(&path) else {
        return FileConfig::default();
    };
    match toml::from_str::<FileConfig>(&raw) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "bad config TOML; ignoring file");
            FileConfig::default()
        }
    }
}

fn default_config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        })
        .join("rollcall/config.toml")
}

fn default_db_path() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall/attendance.db")
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_config_parses() {
        let cfg: FileConfig = toml::from_str(
            r#"
            db_path = "/var/lib/rollcall/attendance.db"
            max_distance = 0.45
            period = "window:300"
            utc_offset_minutes = 120
            system_bus = true
            "#,
        )
        .unwrap();
        assert_eq!(
            cfg.db_path.as_deref(),
            Some(std::path::Path::new("/var/lib/rollcall/attendance.db"))
        );
        assert_eq!(cfg.max_distance, Some(0.45));
        assert_eq!(cfg.ambiguity_margin, None);
        assert_eq!(cfg.period.as_deref(), Some("window:300"));
        assert_eq!(cfg.utc_offset_minutes, Some(120));
        assert_eq!(cfg.system_bus, Some(true));
    }

    #[test]
    fn test_empty_file_config() {
        let cfg: FileConfig = toml::from_str("").unwrap();
        assert!(cfg.db_path.is_none());
        assert!(cfg.period.is_none());
    }
}

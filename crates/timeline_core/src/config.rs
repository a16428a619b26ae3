//! Environment-driven bot configuration.
//!
//! # Responsibility
//! - Read every runtime setting from one key lookup and apply defaults.
//! - Reject malformed values with the offending key and value.
//!
//! # Invariants
//! - `limits.truncate_length <= limits.max_length`, both non-zero.
//! - `log_dir` is absolute.

use crate::logging::{default_log_level, normalize_level};
use crate::model::message::Visibility;
use crate::service::formatter::{MessageLimits, DEFAULT_MAX_LENGTH, DEFAULT_TRUNCATE_LENGTH};
use chrono::NaiveTime;
use chrono_tz::Tz;
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_DATABASE_PATH: &str = "data/timeline.db";
pub const DEFAULT_SUMMARIES_DIR: &str = "data/summaries";
pub const DEFAULT_TIMEZONE: &str = "Asia/Tokyo";
pub const DEFAULT_POST_TIMES: &str = "00:01,12:00";
pub const DEFAULT_TIMELINE_URL: &str = "https://yuinoid.neocities.org/txt/my_dsns_timeline";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    /// Working directory needed for relative defaults is unavailable.
    WorkingDir(std::io::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}=`{value}`: {reason}")
            }
            Self::WorkingDir(err) => write!(f, "cannot resolve working directory: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidValue { .. } => None,
            Self::WorkingDir(err) => Some(err),
        }
    }
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub database_path: PathBuf,
    pub summaries_dir: PathBuf,
    pub log_level: String,
    pub log_dir: PathBuf,
    pub timezone: Tz,
    /// Local times of day for scheduled posts, sorted.
    pub post_times: Vec<NaiveTime>,
    pub scheduled_post_visibility: Visibility,
    pub bot_user_id: Option<String>,
    pub bot_username: Option<String>,
    pub limits: MessageLimits,
    pub timeline_url: String,
    pub dry_run: bool,
}

impl BotConfig {
    /// Reads the process environment; `.env` must already be loaded.
    pub fn from_env() -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(ConfigError::WorkingDir)?;
        Self::from_lookup(|key| std::env::var(key).ok(), &cwd)
    }

    /// Builds a config from `lookup`, resolving relative defaults against `cwd`.
    pub fn from_lookup<F>(lookup: F, cwd: &Path) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let log_level = match get("LOG_LEVEL") {
            Some(value) => normalize_level(&value)
                .map_err(|err| invalid("LOG_LEVEL", &value, err.to_string()))?
                .to_string(),
            None => default_log_level().to_string(),
        };

        let log_dir = match get("LOG_DIR") {
            Some(value) => {
                let path = PathBuf::from(&value);
                if !path.is_absolute() {
                    return Err(invalid("LOG_DIR", &value, "path must be absolute"));
                }
                path
            }
            None => cwd.join("logs"),
        };

        let timezone = {
            let value = get("TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
            value
                .parse::<Tz>()
                .map_err(|err| invalid("TIMEZONE", &value, err.to_string()))?
        };

        let post_times = parse_post_times(
            lookup("POST_TIMES")
                .as_deref()
                .unwrap_or(DEFAULT_POST_TIMES),
        )?;

        let scheduled_post_visibility = match get("SCHEDULED_POST_VISIBILITY") {
            Some(value) => value.parse::<Visibility>().unwrap_or_else(|err| {
                warn!(
                    "event=config_load module=config status=fallback key=SCHEDULED_POST_VISIBILITY default={} error={}",
                    Visibility::default(),
                    err
                );
                Visibility::default()
            }),
            None => Visibility::default(),
        };

        let max_length = parse_count(get("MAX_MESSAGE_LENGTH"), "MAX_MESSAGE_LENGTH", DEFAULT_MAX_LENGTH)?;
        let truncate_length = parse_count(get("TRUNCATE_LENGTH"), "TRUNCATE_LENGTH", DEFAULT_TRUNCATE_LENGTH)?;
        if truncate_length > max_length {
            return Err(invalid(
                "TRUNCATE_LENGTH",
                &truncate_length.to_string(),
                format!("must not exceed MAX_MESSAGE_LENGTH ({max_length})"),
            ));
        }

        let dry_run = match get("DRY_RUN") {
            Some(value) => parse_flag(&value).ok_or_else(|| invalid("DRY_RUN", &value, "expected true or false"))?,
            None => false,
        };

        Ok(Self {
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            summaries_dir: get("SUMMARIES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SUMMARIES_DIR)),
            log_level,
            log_dir,
            timezone,
            post_times,
            scheduled_post_visibility,
            bot_user_id: get("BOT_USER_ID"),
            bot_username: get("BOT_USERNAME"),
            limits: MessageLimits {
                max_length,
                truncate_length,
            },
            timeline_url: get("TIMELINE_URL").unwrap_or_else(|| DEFAULT_TIMELINE_URL.to_string()),
            dry_run,
        })
    }

    /// Post times rendered as `HH:MM`.
    pub fn post_time_labels(&self) -> Vec<String> {
        self.post_times
            .iter()
            .map(|time| time.format("%H:%M").to_string())
            .collect()
    }
}

/// Parses a comma-separated `HH:MM` list; blank yields no slots.
pub fn parse_post_times(raw: &str) -> ConfigResult<Vec<NaiveTime>> {
    let mut times = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let time = NaiveTime::parse_from_str(part, "%H:%M")
            .map_err(|_| invalid("POST_TIMES", part, "expected HH:MM"))?;
        times.push(time);
    }
    times.sort();
    times.dedup();
    Ok(times)
}

fn parse_count(value: Option<String>, key: &'static str, default: usize) -> ConfigResult<usize> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.parse::<usize>() {
        Ok(0) => Err(invalid(key, &value, "must be positive")),
        Ok(count) => Ok(count),
        Err(err) => Err(invalid(key, &value, err.to_string())),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::{BotConfig, ConfigError, DEFAULT_TIMELINE_URL};
    use crate::model::message::Visibility;
    use chrono::NaiveTime;
    use std::collections::HashMap;
    use std::path::Path;

    fn config(pairs: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        BotConfig::from_lookup(|key| env.get(key).cloned(), Path::new("/srv/timeline"))
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.database_path, Path::new("data/timeline.db"));
        assert_eq!(config.log_dir, Path::new("/srv/timeline/logs"));
        assert_eq!(config.timezone, chrono_tz::Asia::Tokyo);
        assert_eq!(config.post_time_labels(), vec!["00:01", "12:00"]);
        assert_eq!(config.scheduled_post_visibility, Visibility::Home);
        assert_eq!(config.limits.max_length, 3000);
        assert_eq!(config.limits.truncate_length, 2997);
        assert_eq!(config.timeline_url, DEFAULT_TIMELINE_URL);
        assert!(!config.dry_run);
        assert!(config.bot_user_id.is_none());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = config(&[
            ("LOG_LEVEL", "WARNING"),
            ("TIMEZONE", "UTC"),
            ("POST_TIMES", "18:30, 07:00"),
            ("SCHEDULED_POST_VISIBILITY", "Public"),
            ("BOT_USER_ID", "bot1"),
            ("MAX_MESSAGE_LENGTH", "500"),
            ("TRUNCATE_LENGTH", "497"),
            ("DRY_RUN", "yes"),
        ])
        .unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.timezone, chrono_tz::UTC);
        assert_eq!(
            config.post_times,
            vec![
                NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(18, 30, 0).unwrap()
            ]
        );
        assert_eq!(config.scheduled_post_visibility, Visibility::Public);
        assert_eq!(config.bot_user_id.as_deref(), Some("bot1"));
        assert_eq!(config.limits.max_length, 500);
        assert!(config.dry_run);
    }

    #[test]
    fn unknown_visibility_falls_back_to_home() {
        let config = config(&[("SCHEDULED_POST_VISIBILITY", "everyone")]).unwrap();
        assert_eq!(config.scheduled_post_visibility, Visibility::Home);
    }

    #[test]
    fn empty_post_times_disable_scheduling() {
        let config = config(&[("POST_TIMES", "")]).unwrap();
        assert!(config.post_times.is_empty());
    }

    #[test]
    fn malformed_values_name_the_key() {
        let cases = [
            ("TIMEZONE", "Mars/Olympus"),
            ("POST_TIMES", "25:00"),
            ("MAX_MESSAGE_LENGTH", "lots"),
            ("DRY_RUN", "maybe"),
            ("LOG_DIR", "relative/logs"),
            ("LOG_LEVEL", "verbose"),
        ];
        for (key, value) in cases {
            match config(&[(key, value)]) {
                Err(ConfigError::InvalidValue { key: reported, .. }) => assert_eq!(reported, key),
                other => panic!("expected invalid {key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn truncate_length_cannot_exceed_max_length() {
        let err = config(&[("MAX_MESSAGE_LENGTH", "100"), ("TRUNCATE_LENGTH", "200")]).unwrap_err();
        assert!(err.to_string().contains("TRUNCATE_LENGTH"));
    }
}

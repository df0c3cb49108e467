//! Configuration management for timelock

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default trusted time authority
pub const DEFAULT_TIME_URL: &str = "https://worldtimeapi.org/api/timezone/Etc/UTC";

/// Default reference offset: UTC+05:30
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

/// Default request timeout for the time authority (seconds)
pub const DEFAULT_TIME_TIMEOUT_SECS: u64 = 10;

/// How lock state is laid out on disk
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SlotMode {
    /// One global key and record; locking a second file orphans the first
    #[default]
    Single,

    /// One key and record per file
    PerFile,
}

impl std::str::FromStr for SlotMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(SlotMode::Single),
            "per-file" | "per_file" | "perfile" => Ok(SlotMode::PerFile),
            other => Err(Error::InvalidConfig(format!(
                "Unknown slot mode '{}' (expected 'single' or 'per-file')",
                other
            ))),
        }
    }
}

/// Trusted time source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// HTTP endpoint of the time authority
    pub url: String,

    /// Fixed reference offset from UTC in minutes
    pub utc_offset_minutes: i32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Attempts before giving up (at least 1)
    pub retry_attempts: u32,

    /// Base delay for exponential backoff (ms)
    pub retry_base_delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the key and lock metadata files
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Single global slot or one slot per file
    #[serde(default)]
    pub slot_mode: SlotMode,

    /// Time authority configuration
    #[serde(default)]
    pub time: TimeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for TimeConfig {
    fn default() -> Self {
        TimeConfig {
            url: DEFAULT_TIME_URL.to_string(),
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            timeout_secs: DEFAULT_TIME_TIMEOUT_SECS,
            retry_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "warn".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            state_dir: default_state_dir(),
            slot_mode: SlotMode::Single,
            time: TimeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file (YAML or JSON), with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = std::fs::read_to_string(path_ref)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let content = Self::substitute_env_vars(&content);

        let mut config: Config = if is_yaml(path_ref) {
            serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse YAML config: {}", e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse JSON config: {}", e)))?
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise start from defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            let mut config = Config::default();
            config.apply_env_overrides()?;
            config.validate()?;
            Ok(config)
        }
    }

    /// Substitute environment variables in config content
    /// Supports ${VAR_NAME} syntax
    fn substitute_env_vars(content: &str) -> String {
        let re = match Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") {
            Ok(re) => re,
            Err(_) => return content.to_string(),
        };

        re.replace_all(content, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("TIMELOCK_STATE_DIR") {
            let dir = dir.trim();
            if !dir.is_empty() {
                self.state_dir = PathBuf::from(dir);
            }
        }

        if let Ok(url) = std::env::var("TIMELOCK_TIME_URL") {
            let url = url.trim();
            if !url.is_empty() {
                self.time.url = url.to_string();
            }
        }

        if let Ok(offset) = std::env::var("TIMELOCK_UTC_OFFSET_MINUTES") {
            self.time.utc_offset_minutes = offset.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!(
                    "Invalid TIMELOCK_UTC_OFFSET_MINUTES: '{}'",
                    offset.trim()
                ))
            })?;
        }

        if let Ok(mode) = std::env::var("TIMELOCK_SLOT_MODE") {
            self.slot_mode = mode.parse()?;
        }

        Ok(())
    }

    /// Save configuration to a file (format determined by extension)
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();

        let content = if is_yaml(path_ref) {
            serde_yaml::to_string(self)
                .map_err(|e| Error::Config(format!("Failed to serialize config to YAML: {}", e)))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| Error::Config(format!("Failed to serialize config to JSON: {}", e)))?
        };

        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path_ref, content)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.time.url.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "Time source URL is required".to_string(),
            ));
        }

        if !(self.time.url.starts_with("http://") || self.time.url.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!(
                "Time source URL must be http(s): {}",
                self.time.url
            )));
        }

        // chrono::FixedOffset accepts strictly less than one day
        if self.time.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(Error::InvalidConfig(format!(
                "UTC offset out of range: {} minutes",
                self.time.utc_offset_minutes
            )));
        }

        if self.time.timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "Time source timeout must be greater than 0".to_string(),
            ));
        }

        if self.time.retry_attempts == 0 {
            return Err(Error::InvalidConfig(
                "Time source retry_attempts must be at least 1".to_string(),
            ));
        }

        if self.state_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "State directory is required".to_string(),
            ));
        }

        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.slot_mode, SlotMode::Single);
        assert_eq!(config.time.utc_offset_minutes, 330);
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.slot_mode = SlotMode::PerFile;
        config.time.url = "http://127.0.0.1:9/time".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.slot_mode, SlotMode::PerFile);
        assert_eq!(loaded.time.url, "http://127.0.0.1:9/time");
    }

    #[test]
    fn test_yaml_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "state_dir: /var/lib/timelock\n\
             slot_mode: per-file\n\
             time:\n  url: https://time.example.com/now\n  utc_offset_minutes: 0\n  \
             timeout_secs: 5\n  retry_attempts: 1\n  retry_base_delay_ms: 100\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/timelock"));
        assert_eq!(config.slot_mode, SlotMode::PerFile);
        assert_eq!(config.time.utc_offset_minutes, 0);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"slot_mode": "per-file"}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.slot_mode, SlotMode::PerFile);
        assert_eq!(config.state_dir, PathBuf::from("."));
        assert_eq!(config.time.url, DEFAULT_TIME_URL);

        std::fs::write(&path, r#"{"time": {"url": "http://127.0.0.1:9/now"}}"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.time.url, "http://127.0.0.1:9/now");
        assert_eq!(config.time.utc_offset_minutes, DEFAULT_UTC_OFFSET_MINUTES);
        assert_eq!(config.time.retry_attempts, 3);
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("TIMELOCK_TEST_HOST", "time.internal");
        let out = Config::substitute_env_vars("https://${TIMELOCK_TEST_HOST}/now ${UNSET_TIMELOCK_VAR}");
        assert_eq!(out, "https://time.internal/now ${UNSET_TIMELOCK_VAR}");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.time.utc_offset_minutes = 24 * 60;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = Config::default();
        config.time.url = "ftp://example.com".to_string();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = Config::default();
        config.time.retry_attempts = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_slot_mode_parse() {
        assert_eq!("single".parse::<SlotMode>().unwrap(), SlotMode::Single);
        assert_eq!("Per-File".parse::<SlotMode>().unwrap(), SlotMode::PerFile);
        assert!("many".parse::<SlotMode>().is_err());
    }
}

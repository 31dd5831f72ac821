//! Daemon configuration file.
//!
//! The file is line oriented, one `key: value` pair per line. Keys are
//! case-insensitive, lines starting with `#` are comments:
//!
//! ```text
//! # /etc/garagedoor/garagedoor.conf
//! close time: 15
//! port: 17000
//! subnet: 192.168.1.0/24
//! ```
//!
//! Parsing is lenient: a bad line never aborts loading. Each problem is
//! returned as a [`ConfigIssue`] and the affected setting keeps its previous
//! value, so a reload with a typo leaves the running daemon unchanged.

use crate::constants::*;
use crate::{Error, Result};
use ipnet::IpNet;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Effective daemon settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    /// How long the beam must stay clear before automation presses the button.
    pub close_time: Duration,

    /// Listen port of the command server.
    pub port: u16,

    /// Trusted local network. `None` means detect at startup.
    pub subnet: Option<IpNet>,

    /// Presence of this file suppresses relay presses.
    pub disarm_file: PathBuf,

    /// Sound player command; the cue file path is appended.
    pub sound_command: String,

    /// Command run when the door stays open too long.
    pub alert_command: Option<String>,

    /// Command run to ban an address; the IP is appended.
    pub ban_command: String,

    /// How long a ban is remembered before the address may be banned again.
    pub ban_time: Duration,

    pub key_file: PathBuf,
    pub cert_file: PathBuf,
    pub client_cert_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            close_time: Duration::from_millis(DEFAULT_CLOSE_TIME_MS),
            port: DEFAULT_PORT,
            subnet: None,
            disarm_file: PathBuf::from(DEFAULT_DISARM_FILE),
            sound_command: DEFAULT_SOUND_COMMAND.to_string(),
            alert_command: None,
            ban_command: DEFAULT_BAN_COMMAND.to_string(),
            ban_time: Duration::from_millis(DEFAULT_BAN_TIME_MS),
            key_file: PathBuf::from(DEFAULT_KEY_FILE),
            cert_file: PathBuf::from(DEFAULT_CERT_FILE),
            client_cert_file: PathBuf::from(DEFAULT_CLIENT_CERT_FILE),
        }
    }
}

/// A problem found while applying a configuration file.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigIssue {
    #[error("Unknown config item: \"{0}\"")]
    UnknownKey(String),

    #[error("Line {line_no} is not a \"key: value\" pair")]
    MalformedLine { line_no: usize },

    #[error("Invalid value for \"{key}\": \"{value}\"")]
    InvalidValue { key: String, value: String },

    #[error("Close time must be at least {min_secs} seconds, got {secs}")]
    CloseTimeTooShort { secs: f64, min_secs: u64 },
}

impl Config {
    /// Read and apply a configuration file on top of the defaults.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, Vec<ConfigIssue>)> {
        let mut config = Self::default();
        let issues = config.reload(path)?;
        Ok((config, issues))
    }

    /// Re-read a configuration file, keeping current values for anything the
    /// file does not set or sets badly.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read.
    pub fn reload(&mut self, path: impl AsRef<Path>) -> Result<Vec<ConfigIssue>> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(self.apply_str(&text))
    }

    /// Apply configuration text and return every problem encountered.
    pub fn apply_str(&mut self, text: &str) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                issues.push(ConfigIssue::MalformedLine { line_no: index + 1 });
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            if let Err(issue) = self.apply_pair(&key, value) {
                issues.push(issue);
            }
        }

        issues
    }

    fn apply_pair(&mut self, key: &str, value: &str) -> std::result::Result<(), ConfigIssue> {
        let invalid = || ConfigIssue::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "close time" => {
                let secs: f64 = value.parse().map_err(|_| invalid())?;
                if !secs.is_finite() {
                    return Err(invalid());
                }
                if secs < (MIN_CLOSE_TIME_MS / 1000) as f64 {
                    return Err(ConfigIssue::CloseTimeTooShort {
                        secs,
                        min_secs: MIN_CLOSE_TIME_MS / 1000,
                    });
                }
                self.close_time = Duration::try_from_secs_f64(secs).map_err(|_| invalid())?;
                debug!(close_time_secs = secs, "Close time set");
            }
            "ban time" => {
                let secs: f64 = value.parse().map_err(|_| invalid())?;
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(invalid());
                }
                self.ban_time = Duration::try_from_secs_f64(secs).map_err(|_| invalid())?;
                debug!(ban_time_secs = secs, "Ban time set");
            }
            "port" => {
                self.port = value.parse().map_err(|_| invalid())?;
                debug!(port = self.port, "Port set");
            }
            "subnet" => {
                self.subnet = Some(value.parse().map_err(|_| invalid())?);
            }
            "disarm file" => self.disarm_file = non_empty(value).ok_or_else(invalid)?.into(),
            "sound command" => self.sound_command = non_empty(value).ok_or_else(invalid)?.into(),
            "alert command" => self.alert_command = non_empty(value).map(str::to_string),
            "ban command" => self.ban_command = non_empty(value).ok_or_else(invalid)?.into(),
            "key file" => self.key_file = non_empty(value).ok_or_else(invalid)?.into(),
            "cert file" => self.cert_file = non_empty(value).ok_or_else(invalid)?.into(),
            "client cert file" => {
                self.client_cert_file = non_empty(value).ok_or_else(invalid)?.into();
            }
            _ => return Err(ConfigIssue::UnknownKey(key.to_string())),
        }

        Ok(())
    }

    /// Check that the settings needed to serve are usable.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::Config("port must be non-zero".to_string()));
        }
        if self.close_time < Duration::from_millis(MIN_CLOSE_TIME_MS) {
            return Err(Error::Config(format!(
                "close time {:?} is below the {} ms minimum",
                self.close_time, MIN_CLOSE_TIME_MS
            )));
        }
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 17000);
        assert_eq!(config.close_time, Duration::from_secs(13));
        assert_eq!(config.disarm_file, PathBuf::from("/tmp/disarmed"));
        assert!(config.subnet.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_full_file() {
        let mut config = Config::default();
        let issues = config.apply_str(
            "# comment\n\
             Close Time: 15.5\n\
             port: 16000\n\
             \n\
             subnet: 10.0.0.0/24\n\
             alert command: /usr/local/bin/door-alert\n",
        );

        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(config.close_time, Duration::from_millis(15_500));
        assert_eq!(config.port, 16000);
        assert_eq!(config.subnet, Some("10.0.0.0/24".parse().unwrap()));
        assert_eq!(
            config.alert_command.as_deref(),
            Some("/usr/local/bin/door-alert")
        );
    }

    #[test]
    fn test_close_time_below_minimum_keeps_previous() {
        let mut config = Config::default();
        let issues = config.apply_str("close time: 4");

        assert_eq!(
            issues,
            vec![ConfigIssue::CloseTimeTooShort {
                secs: 4.0,
                min_secs: 13
            }]
        );
        assert_eq!(config.close_time, Duration::from_secs(13));
    }

    #[rstest]
    #[case("port: abc")]
    #[case("port: 70000")]
    #[case("close time: soon")]
    #[case("subnet: 10.0.0.0/99")]
    #[case("close time: NaN")]
    #[case("ban time: 0")]
    #[case("ban time: -5")]
    fn test_invalid_values_reported(#[case] text: &str) {
        let mut config = Config::default();
        let issues = config.apply_str(text);

        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0], ConfigIssue::InvalidValue { .. }));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_unknown_key_and_malformed_line() {
        let mut config = Config::default();
        let issues = config.apply_str("colour: red\njust some words\n");

        assert_eq!(
            issues,
            vec![
                ConfigIssue::UnknownKey("colour".to_string()),
                ConfigIssue::MalformedLine { line_no: 2 },
            ]
        );
    }

    #[test]
    fn test_ban_time() {
        let mut config = Config::default();
        assert_eq!(config.ban_time, Duration::from_secs(600));

        let issues = config.apply_str("Ban Time: 3600");
        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(config.ban_time, Duration::from_secs(3600));
    }

    #[test]
    fn test_values_keep_case() {
        let mut config = Config::default();
        config.apply_str("DISARM FILE: /tmp/Disarmed");
        assert_eq!(config.disarm_file, PathBuf::from("/tmp/Disarmed"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garagedoor.conf");
        std::fs::write(&path, "port: 16001\nclose time: 20\n").unwrap();

        let (config, issues) = Config::load(&path).unwrap();
        assert!(issues.is_empty());
        assert_eq!(config.port, 16001);
        assert_eq!(config.close_time, Duration::from_secs(20));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(dir.path().join("nope.conf"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_reload_keeps_unset_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garagedoor.conf");
        std::fs::write(&path, "port: 16002\n").unwrap();

        let mut config = Config::default();
        config.close_time = Duration::from_secs(30);
        config.reload(&path).unwrap();

        assert_eq!(config.port, 16002);
        assert_eq!(config.close_time, Duration::from_secs(30));
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let config = Config {
            port: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}

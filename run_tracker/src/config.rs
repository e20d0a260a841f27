use std::{path::{Path, PathBuf}, str::FromStr, time::Duration};

use run_tracker_data_management::default_database_path;

use crate::engine::FilterSettings;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("line {line}: unknown config key {key:?}")]
    UnknownKey { line: usize, key: String },
    #[error("line {line}: invalid value {value:?} for {key}")]
    InvalidValue { line: usize, key: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub database_path: PathBuf,
    /// Fixes with a horizontal accuracy above this many meters are dropped
    pub accuracy_threshold: f64,
    /// Jumps longer than this many meters between accepted fixes are treated as glitches
    pub glitch_threshold: f64,
    pub checkpoint_interval: Duration,
    /// Finished sessions older than this are removed by `prune`
    pub retention_days: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            accuracy_threshold: 40.0,
            glitch_threshold: 100.0,
            checkpoint_interval: Duration::from_secs(10),
            retention_days: 90,
        }
    }
}

impl TrackerConfig {
    /// Parses `key = value` lines on top of the defaults. Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line_number = index + 1;
            let (key, value) = line.split_once('=')
                .map(|(key, value)| (key.trim(), value.trim()))
                .ok_or_else(|| ConfigError::InvalidValue { line: line_number, key: line.to_string(), value: String::new() })?;

            match key {
                "database_path" => config.database_path = PathBuf::from(value),
                "accuracy_threshold" => config.accuracy_threshold = parse_value(line_number, key, value)?,
                "glitch_threshold" => config.glitch_threshold = parse_value(line_number, key, value)?,
                "checkpoint_interval_secs" => config.checkpoint_interval = Duration::from_secs(parse_value(line_number, key, value)?),
                "retention_days" => config.retention_days = parse_value(line_number, key, value)?,
                _ => return Err(ConfigError::UnknownKey { line: line_number, key: key.to_string() }),
            }
        }

        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::parse(&text)
    }

    pub fn filter(&self) -> FilterSettings {
        FilterSettings {
            accuracy_threshold: self.accuracy_threshold,
            glitch_threshold: self.glitch_threshold,
        }
    }
}

fn parse_value<T: FromStr>(line: usize, key: &str, value: &str) -> Result<T, ConfigError> {
    T::from_str(value).map_err(|_| ConfigError::InvalidValue {
        line,
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = TrackerConfig::parse("\n# nothing here\n").unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.filter(), FilterSettings::default());
    }

    #[test]
    fn overrides_known_keys() {
        let config = TrackerConfig::parse("
            database_path = /tmp/runs.db
            accuracy_threshold = 25.5
            # longer interval on slow storage
            checkpoint_interval_secs=30
            retention_days = 7
        ").unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/runs.db"));
        assert_eq!(config.accuracy_threshold, 25.5);
        assert_eq!(config.glitch_threshold, 100.0);
        assert_eq!(config.checkpoint_interval, Duration::from_secs(30));
        assert_eq!(config.retention_days, 7);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(matches!(TrackerConfig::parse("sim_pin = 1234"), Err(ConfigError::UnknownKey { line: 1, .. })));
        assert!(matches!(
            TrackerConfig::parse("retention_days = 90\nglitch_threshold = far"),
            Err(ConfigError::InvalidValue { line: 2, .. })
        ));
        assert!(matches!(TrackerConfig::parse("retention_days"), Err(ConfigError::InvalidValue { .. })));
    }
}

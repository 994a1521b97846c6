//! Loader configuration.
//!
//! Settings are read from an INI file, by default
//! `~/.config/geomodel/config.ini`:
//!
//! ```ini
//! [cache]
//! poll_interval_ms = 100
//! max_wait_ms = 30000
//!
//! [animation]
//! frame_interval_ms = 16
//!
//! [http]
//! timeout_secs = 30
//! user_agent = geomodel/0.1
//! ```
//!
//! Every key is optional. A missing file yields the defaults; a value that
//! does not parse is an error rather than being silently replaced.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use crate::animation::DEFAULT_FRAME_INTERVAL;
use crate::cache::CacheConfig;
use crate::fetch::{DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT};

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read or parsed.
    #[error("Failed to read config {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// A key holds a value of the wrong shape.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Complete loader configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GeomodelConfig {
    pub cache: CacheConfig,
    /// Animation frame clock period.
    pub frame_interval: Duration,
    pub http: HttpConfig,
}

impl Default for GeomodelConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            http: HttpConfig::default(),
        }
    }
}

impl GeomodelConfig {
    /// `<config dir>/geomodel/config.ini`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("geomodel").join("config.ini"))
    }

    /// Loads from the default location, falling back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Loads from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config = Self::from_ini(&ini)?;
        debug!(path = %path.display(), ?config, "Loaded config");
        Ok(config)
    }

    /// Parses configuration from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(ms) = parse_key::<u64>(ini, "cache", "poll_interval_ms")? {
            if ms == 0 {
                return Err(invalid("cache.poll_interval_ms", "0"));
            }
            config.cache.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_key::<u64>(ini, "cache", "max_wait_ms")? {
            // 0 disables the bound
            config.cache.max_wait = (ms > 0).then(|| Duration::from_millis(ms));
        }

        if let Some(ms) = parse_key::<u64>(ini, "animation", "frame_interval_ms")? {
            if ms == 0 {
                return Err(invalid("animation.frame_interval_ms", "0"));
            }
            config.frame_interval = Duration::from_millis(ms);
        }

        if let Some(secs) = parse_key::<u64>(ini, "http", "timeout_secs")? {
            config.http.timeout = Duration::from_secs(secs);
        }
        if let Some(agent) = ini.get_from(Some("http"), "user_agent") {
            let agent = agent.trim();
            if agent.is_empty() {
                return Err(invalid("http.user_agent", agent));
            }
            config.http.user_agent = agent.to_string();
        }

        Ok(config)
    }
}

fn parse_key<T: FromStr>(ini: &Ini, section: &str, key: &str) -> Result<Option<T>, ConfigError> {
    match ini.get_from(Some(section), key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(&format!("{}.{}", section, key), raw)),
        None => Ok(None),
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = GeomodelConfig::default();
        assert_eq!(config.cache.poll_interval, Duration::from_millis(100));
        assert_eq!(config.cache.max_wait, None);
        assert_eq!(config.frame_interval, Duration::from_millis(16));
        assert_eq!(config.http.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_parse_all_sections() {
        let config = GeomodelConfig::parse(
            "[cache]\npoll_interval_ms = 50\nmax_wait_ms = 2000\n\
             [animation]\nframe_interval_ms = 33\n\
             [http]\ntimeout_secs = 5\nuser_agent = test-agent\n",
        )
        .unwrap();

        assert_eq!(config.cache.poll_interval, Duration::from_millis(50));
        assert_eq!(config.cache.max_wait, Some(Duration::from_secs(2)));
        assert_eq!(config.frame_interval, Duration::from_millis(33));
        assert_eq!(config.http.timeout, Duration::from_secs(5));
        assert_eq!(config.http.user_agent, "test-agent");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = GeomodelConfig::parse("[animation]\nframe_interval_ms = 20\n").unwrap();
        assert_eq!(config.frame_interval, Duration::from_millis(20));
        assert_eq!(config.cache, CacheConfig::default());
        assert_eq!(config.http, HttpConfig::default());
    }

    #[test]
    fn test_zero_max_wait_means_unbounded() {
        let config = GeomodelConfig::parse("[cache]\nmax_wait_ms = 0\n").unwrap();
        assert_eq!(config.cache.max_wait, None);
    }

    #[test]
    fn test_invalid_values() {
        let err = GeomodelConfig::parse("[cache]\npoll_interval_ms = soon\n").unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value } => {
                assert_eq!(key, "cache.poll_interval_ms");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error {:?}", other),
        }

        assert!(matches!(
            GeomodelConfig::parse("[animation]\nframe_interval_ms = 0\n"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[http]\ntimeout_secs = 12").unwrap();

        let config = GeomodelConfig::load_from(file.path()).unwrap();
        assert_eq!(config.http.timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GeomodelConfig::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, GeomodelConfig::default());
    }

    #[test]
    fn test_default_path_ends_with_config_ini() {
        if let Some(path) = GeomodelConfig::default_path() {
            assert!(path.ends_with("geomodel/config.ini"));
        }
    }
}

//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub imu: ImuConfig,

    #[serde(default)]
    pub recordings: RecordingsConfig,

    #[serde(default)]
    pub stream: StreamConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// IMU sampling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ImuConfig {
    /// Polling cadence of the acquisition loop in milliseconds
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Use the simulated IMU source instead of real hardware
    #[serde(default = "default_simulated")]
    pub simulated: bool,
}

/// Recording storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RecordingsConfig {
    #[serde(default = "default_recordings_dir")]
    pub dir: String,
}

/// Live stream configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    /// Broadcast channel capacity; slow subscribers beyond this lag are dropped
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

// Default value functions
fn default_bind_addr() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

fn default_sample_interval_ms() -> u64 { 10 }
fn default_simulated() -> bool { true }

fn default_recordings_dir() -> String { "./recs".to_string() }

fn default_channel_capacity() -> usize { 64 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl Default for ImuConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            simulated: default_simulated(),
        }
    }
}

impl Default for RecordingsConfig {
    fn default() -> Self {
        Self {
            dir: default_recordings_dir(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            imu: ImuConfig::default(),
            recordings: RecordingsConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use imu_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_addr.is_empty() {
            return Err(crate::error::ImuBridgeError::Config(
                toml::de::Error::custom("bind_addr cannot be empty")
            ));
        }

        if self.server.bind_addr.parse::<std::net::IpAddr>().is_err() {
            return Err(crate::error::ImuBridgeError::Config(
                toml::de::Error::custom("bind_addr must be a valid IP address")
            ));
        }

        if self.server.port == 0 {
            return Err(crate::error::ImuBridgeError::Config(
                toml::de::Error::custom("port must be greater than 0")
            ));
        }

        if self.imu.sample_interval_ms == 0 || self.imu.sample_interval_ms > 1000 {
            return Err(crate::error::ImuBridgeError::Config(
                toml::de::Error::custom("sample_interval_ms must be between 1 and 1000")
            ));
        }

        if self.recordings.dir.is_empty() {
            return Err(crate::error::ImuBridgeError::Config(
                toml::de::Error::custom("recordings dir cannot be empty")
            ));
        }

        if self.stream.channel_capacity == 0 || self.stream.channel_capacity > 4096 {
            return Err(crate::error::ImuBridgeError::Config(
                toml::de::Error::custom("channel_capacity must be between 1 and 4096")
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[server]
port = 9090

[imu]
sample_interval_ms = 20

[recordings]
dir = "/tmp/recs"

[stream]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.imu.sample_interval_ms, 20);
        assert_eq!(config.recordings.dir, "/tmp/recs");
        assert_eq!(config.stream.channel_capacity, default_channel_capacity());
    }

    #[test]
    fn test_load_config_empty_file_uses_defaults() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"").unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.server.port, default_port());
        assert_eq!(config.recordings.dir, default_recordings_dir());
    }

    #[test]
    fn test_empty_bind_addr() {
        let mut config = Config::default();
        config.server.bind_addr = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_bind_addr() {
        let mut config = Config::default();
        config.server.bind_addr = "not-an-ip".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_port_zero() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sample_interval_zero() {
        let mut config = Config::default();
        config.imu.sample_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sample_interval_too_high() {
        let mut config = Config::default();
        config.imu.sample_interval_ms = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_recordings_dir() {
        let mut config = Config::default();
        config.recordings.dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_channel_capacity_zero() {
        let mut config = Config::default();
        config.stream.channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_channel_capacity_too_high() {
        let mut config = Config::default();
        config.stream.channel_capacity = 4097;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_bind_addr(), "0.0.0.0");
        assert_eq!(default_port(), 8080);
        assert_eq!(default_sample_interval_ms(), 10);
        assert!(default_simulated());
        assert_eq!(default_recordings_dir(), "./recs");
        assert_eq!(default_channel_capacity(), 64);
    }
}

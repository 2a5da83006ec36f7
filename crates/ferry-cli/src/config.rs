//! Ferry configuration file
//!
//! Optional TOML file, `ferry/config.toml` under the platform config
//! directory (`~/.config` on Linux, `%APPDATA%` on Windows). Every field
//! has a default, so a missing file or a partial one is fine.

use crate::listener::ListenerMode;
use anyhow::Context;
use ferry_core::{ReceiveOptions, SendOptions};
use ferry_core::session::receive::DRAIN_LIMIT;
use ferry_files::DEFAULT_CHUNK_SIZE;
use ferry_link::{DEFAULT_BAUD_RATE, DEFAULT_RECEIVE_TIMEOUT, DEFAULT_SEND_TIMEOUT, LinkConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial line settings
    pub serial: SerialConfig,
    /// Session settings
    pub transfer: TransferConfig,
    /// Stop listener settings
    pub listener: ListenerConfig,
}

/// `[serial]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate when none is given on the command line
    pub baud_rate: u32,
    /// Read timeout for sending links, in milliseconds
    pub send_timeout_ms: u64,
    /// Read timeout for receiving links, in milliseconds
    pub receive_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT.as_millis() as u64,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT.as_millis() as u64,
        }
    }
}

/// `[transfer]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Bytes per read or write
    pub chunk_size: usize,
    /// Largest pending prefix offered at receive start
    pub drain_limit: usize,
    /// Save a partial capture when the link fails
    pub persist_on_error: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            drain_limit: DRAIN_LIMIT,
            persist_on_error: true,
        }
    }
}

/// `[listener]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interval between stop-key checks, in milliseconds
    pub poll_interval_ms: u64,
    /// How the stop key is read
    pub mode: ListenerMode,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            mode: ListenerMode::Auto,
        }
    }
}

impl Config {
    /// `ferry/config.toml` under the platform config directory
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ferry")
            .join("config.toml")
    }

    /// Load from `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Load from `path`, or defaults if there is no file there.
    pub fn load_optional(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from the default path, or defaults if there is no file there.
    pub fn load_or_default() -> anyhow::Result<Self> {
        Self::load_optional(&Self::default_path())
    }

    /// Load the file given with `--config`, which has to exist, or fall back
    /// to the optional default file.
    pub fn load_from(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => Self::load_or_default(),
        }
    }

    /// Write to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    /// Reject values no session can run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.serial.baud_rate == 0 {
            anyhow::bail!("serial.baud_rate must be greater than zero");
        }
        if self.serial.send_timeout_ms == 0 || self.serial.receive_timeout_ms == 0 {
            anyhow::bail!("serial timeouts must be greater than zero");
        }
        if self.transfer.chunk_size == 0 {
            anyhow::bail!("transfer.chunk_size must be greater than zero");
        }
        if self.transfer.drain_limit == 0 {
            anyhow::bail!("transfer.drain_limit must be greater than zero");
        }
        if self.listener.poll_interval_ms == 0 {
            anyhow::bail!("listener.poll_interval_ms must be greater than zero");
        }
        Ok(())
    }

    /// Link settings for sending on `device`.
    pub fn send_link(&self, device: &str, baud_rate: u32) -> LinkConfig {
        LinkConfig::new(device, baud_rate)
            .with_timeout(Duration::from_millis(self.serial.send_timeout_ms))
    }

    /// Link settings for receiving on `device`.
    pub fn receive_link(&self, device: &str, baud_rate: u32) -> LinkConfig {
        LinkConfig::new(device, baud_rate)
            .with_timeout(Duration::from_millis(self.serial.receive_timeout_ms))
    }

    /// Send session options
    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            chunk_size: self.transfer.chunk_size,
        }
    }

    /// Receive session options
    pub fn receive_options(&self) -> ReceiveOptions {
        ReceiveOptions {
            chunk_size: self.transfer.chunk_size,
            drain_limit: self.transfer.drain_limit,
            persist_on_error: self.transfer.persist_on_error,
        }
    }

    /// Stop listener poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.listener.poll_interval_ms)
    }

    /// Value of `key` as text. Keys may be given with or without their section.
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        let value = match key.to_lowercase().as_str() {
            "serial.baud_rate" | "baud_rate" => self.serial.baud_rate.to_string(),
            "serial.send_timeout_ms" | "send_timeout_ms" => {
                self.serial.send_timeout_ms.to_string()
            }
            "serial.receive_timeout_ms" | "receive_timeout_ms" => {
                self.serial.receive_timeout_ms.to_string()
            }
            "transfer.chunk_size" | "chunk_size" => self.transfer.chunk_size.to_string(),
            "transfer.drain_limit" | "drain_limit" => self.transfer.drain_limit.to_string(),
            "transfer.persist_on_error" | "persist_on_error" => {
                self.transfer.persist_on_error.to_string()
            }
            "listener.poll_interval_ms" | "poll_interval_ms" => {
                self.listener.poll_interval_ms.to_string()
            }
            "listener.mode" | "mode" => self.listener.mode.to_string(),
            _ => anyhow::bail!("Unknown configuration key: {key}"),
        };
        Ok(value)
    }

    /// Set `key` from text.
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T> {
            value
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid value for {key}: {value}"))
        }

        match key.to_lowercase().as_str() {
            "serial.baud_rate" | "baud_rate" => self.serial.baud_rate = parse(key, value)?,
            "serial.send_timeout_ms" | "send_timeout_ms" => {
                self.serial.send_timeout_ms = parse(key, value)?;
            }
            "serial.receive_timeout_ms" | "receive_timeout_ms" => {
                self.serial.receive_timeout_ms = parse(key, value)?;
            }
            "transfer.chunk_size" | "chunk_size" => self.transfer.chunk_size = parse(key, value)?,
            "transfer.drain_limit" | "drain_limit" => {
                self.transfer.drain_limit = parse(key, value)?;
            }
            "transfer.persist_on_error" | "persist_on_error" => {
                self.transfer.persist_on_error = parse(key, value)?;
            }
            "listener.poll_interval_ms" | "poll_interval_ms" => {
                self.listener.poll_interval_ms = parse(key, value)?;
            }
            "listener.mode" | "mode" => self.listener.mode = parse(key, value)?,
            _ => anyhow::bail!("Unknown configuration key: {key}"),
        }
        Ok(())
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(stripped)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.serial.baud_rate, 2_000_000);
        assert_eq!(config.serial.send_timeout_ms, 1000);
        assert_eq!(config.serial.receive_timeout_ms, 2000);
        assert_eq!(config.transfer.chunk_size, 1024);
        assert_eq!(config.transfer.drain_limit, 2048);
        assert!(config.transfer.persist_on_error);
        assert_eq!(config.listener.poll_interval_ms, 100);
        assert_eq!(config.listener.mode, ListenerMode::Auto);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str("[serial]\nbaud_rate = 115200\n").unwrap();
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.serial.receive_timeout_ms, 2000);
        assert_eq!(config.transfer, TransferConfig::default());
    }

    #[test]
    fn test_missing_default_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("ferry").join("config.toml");
        assert_eq!(Config::load_optional(&missing).unwrap(), Config::default());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::load_from(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_invalid_values_still_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[transfer]\nchunk_size = 0\n").unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.transfer.chunk_size, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set("listener.mode", "stdin").unwrap();
        config.set("chunk_size", "4096").unwrap();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.listener.mode, ListenerMode::Stdin);
    }

    #[test]
    fn test_get_and_set_keys() {
        let mut config = Config::default();
        config.set("serial.baud_rate", "9600").unwrap();
        assert_eq!(config.get("baud_rate").unwrap(), "9600");
        config.set("PERSIST_ON_ERROR", "false").unwrap();
        assert_eq!(config.get("transfer.persist_on_error").unwrap(), "false");

        assert!(config.set("baud_rate", "fast").is_err());
        assert!(config.set("listener.mode", "mouse").is_err());
        assert!(config.get("network.listen_addr").is_err());
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        let mut config = Config::default();
        config.transfer.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.listener.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.serial.receive_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_options_follow_config() {
        let mut config = Config::default();
        config.transfer.chunk_size = 512;
        config.transfer.persist_on_error = false;
        assert_eq!(config.send_options().chunk_size, 512);
        let receive = config.receive_options();
        assert_eq!(receive.chunk_size, 512);
        assert!(!receive.persist_on_error);

        let link = config.receive_link("/dev/ttyUSB0", 115_200);
        assert_eq!(link.timeout, Duration::from_secs(2));
        assert_eq!(config.send_link("COM8", 9600).timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_expand_path() {
        assert_eq!(expand_path("/etc/ferry.toml"), PathBuf::from("/etc/ferry.toml"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/ferry.toml"), home.join("ferry.toml"));
        }
    }
}

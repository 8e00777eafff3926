// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Configuration module

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (tracing env-filter syntax)
    pub log_level: String,

    /// Readiness loop configuration
    pub event_loop: EventLoopConfig,

    /// Simulated platform configuration
    pub simulator: SimulatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            event_loop: EventLoopConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("imu-bridge"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Readiness loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLoopConfig {
    /// Dispatch on a dedicated thread. When false the host drives dispatch
    /// through `SensorManager::poll`.
    pub dedicated_thread: bool,

    /// Upper bound for one blocking wait in `poll`
    pub poll_timeout_ms: u64,

    /// Name of the dedicated dispatch thread
    pub thread_name: String,
}

impl EventLoopConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            dedicated_thread: true,
            poll_timeout_ms: 500,
            thread_name: "imu-readiness".to_string(),
        }
    }
}

/// Simulated platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Standard deviation of the per-axis noise, in sensor units
    pub noise_std_dev: f32,

    /// Chance per sample of a small bump on the motion axes
    pub vibration_probability: f64,

    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            noise_std_dev: 0.02,
            vibration_probability: 0.02,
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_or_create_round_trip() {
        let dir = std::env::temp_dir().join(format!("imu-bridge-config-{}", std::process::id()));
        let path = dir.join("nested").join("config.toml");
        let _ = std::fs::remove_dir_all(&dir);

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert!(created.event_loop.dedicated_thread);

        let mut edited = created.clone();
        edited.event_loop.dedicated_thread = false;
        edited.simulator.seed = Some(42);
        edited.save(&path).unwrap();

        let loaded = Config::load_or_create(&path).unwrap();
        assert!(!loaded.event_loop.dedicated_thread);
        assert_eq!(loaded.simulator.seed, Some(42));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("log_level = \"debug\"\n[event_loop]\npoll_timeout_ms = 20\n").unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.event_loop.poll_timeout(), Duration::from_millis(20));
        assert_eq!(config.event_loop.thread_name, "imu-readiness");
        assert_eq!(config.simulator.seed, None);
    }
}

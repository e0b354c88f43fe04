//! Configuration module for Hostaudit
//!
//! Handles loading configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/hostaudit/hostaudit.toml)
//! - User configuration (~/.hostaudit.toml)
//! - Project configuration (./hostaudit.toml)
//! - Environment variables
//! - Command-line arguments
//!
//! The first file found in precedence order (explicit path, then
//! `HOSTAUDIT_CONFIG`, project, user, system) is loaded over the defaults;
//! environment variables override on top.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Audit engine settings
    pub audit: AuditConfig,

    /// GeoIP lookup settings
    pub geoip: GeoIpConfig,

    /// System info probe settings
    pub sysinfo: SysinfoConfig,
}

/// Audit engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Size of the check worker pool (minimum 1)
    pub workers: usize,

    /// Per-probe command deadline
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Overall audit deadline; unset means no deadline
    #[serde(default, with = "humantime_serde::option")]
    pub deadline: Option<Duration>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            probe_timeout: Duration::from_secs(30),
            deadline: None,
        }
    }
}

impl AuditConfig {
    /// Worker pool size clamped to the documented minimum of 1.
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }
}

/// GeoIP lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoIpConfig {
    /// Whether lookups are performed at all
    pub enabled: bool,

    /// Path to a MaxMind City database
    pub db_path: PathBuf,

    /// Preferred localized-name language
    pub language: String,

    /// Substrings a successful login's location may match; empty list
    /// disables the location policy in the login-history check
    pub allowed_login_regions: Vec<String>,
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            db_path: PathBuf::from("/var/lib/GeoIP/GeoLite2-City.mmdb"),
            language: "zh-CN".to_string(),
            allowed_login_regions: Vec::new(),
        }
    }
}

/// System info probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SysinfoConfig {
    /// Whether to resolve the public IP over HTTPS; off keeps offline
    /// audits network-silent
    pub public_ip_probe: bool,

    /// Endpoint returning the caller address as plain text
    pub public_ip_url: String,
}

impl Default for SysinfoConfig {
    fn default() -> Self {
        Self {
            public_ip_probe: false,
            public_ip_url: "https://api.ipify.org".to_string(),
        }
    }
}

impl Config {
    /// Load configuration, first existing file wins, then env overrides.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Config::default();

        for path in Self::config_paths(config_path) {
            if path.exists() {
                config = Self::from_file(&path)?;
                break;
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Configuration file paths in precedence order.
    fn config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // Explicit path takes priority
        if let Some(path) = explicit_path {
            paths.push(path.clone());
            return paths;
        }

        if let Ok(env_config) = std::env::var("HOSTAUDIT_CONFIG") {
            paths.push(PathBuf::from(env_config));
        }

        // Project config (current directory)
        paths.push(PathBuf::from("hostaudit.toml"));

        // User config
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".hostaudit.toml"));
            paths.push(home.join(".config/hostaudit/hostaudit.toml"));
        }

        // System-wide config
        paths.push(PathBuf::from("/etc/hostaudit/hostaudit.toml"));

        paths
    }

    fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config_load(path.clone(), e.to_string()))?;
        toml::from_str(&content).map_err(|e| Error::config_load(path.clone(), e.to_string()))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(workers) = std::env::var("HOSTAUDIT_WORKERS") {
            if let Ok(n) = workers.parse() {
                self.audit.workers = n;
            }
        }

        if let Ok(timeout) = std::env::var("HOSTAUDIT_PROBE_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.audit.probe_timeout = Duration::from_secs(secs);
            }
        }

        if let Ok(db_path) = std::env::var("HOSTAUDIT_GEOIP_DB") {
            self.geoip.enabled = true;
            self.geoip.db_path = PathBuf::from(db_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.audit.workers, 4);
        assert_eq!(config.audit.probe_timeout, Duration::from_secs(30));
        assert_eq!(config.audit.deadline, None);
        assert!(!config.geoip.enabled);
        assert_eq!(config.geoip.language, "zh-CN");
        assert!(config.geoip.allowed_login_regions.is_empty());
        assert!(!config.sysinfo.public_ip_probe);
    }

    #[test]
    fn test_workers_clamped_to_one() {
        let config = AuditConfig {
            workers: 0,
            ..Default::default()
        };
        assert_eq!(config.effective_workers(), 1);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [audit]
            workers = 8
            probe_timeout = "10s"

            [geoip]
            enabled = true
            language = "en"
            allowed_login_regions = ["中国", "Singapore"]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.audit.workers, 8);
        assert_eq!(config.audit.probe_timeout, Duration::from_secs(10));
        assert!(config.geoip.enabled);
        assert_eq!(config.geoip.allowed_login_regions.len(), 2);
        // Sections not present keep their defaults
        assert!(!config.sysinfo.public_ip_probe);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: Config = toml::from_str("[audit]\nworkers = 2\n").unwrap();
        assert_eq!(config.audit.workers, 2);
        assert_eq!(config.audit.probe_timeout, Duration::from_secs(30));
    }
}

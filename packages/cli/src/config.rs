//! CLI Configuration
//!
//! Manages the Host Agent profile (user, host, transport settings) stored in
//! ~/.hostctrl/config.toml. Passwords are never stored.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hostctrl_agent::connection::transport::{
    ConnectionOptions, DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT, DEFAULT_TIMEOUT_SECS,
};

#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub username: Option<String>,
    pub fqdn: Option<String>,
    pub fallback: Option<bool>,
    pub https_port: Option<u16>,
    pub http_port: Option<u16>,
    pub timeout_secs: Option<u64>,
    pub ca_bundle: Option<PathBuf>,
}

impl Config {
    /// Get the config file path (~/.hostctrl/config.toml)
    pub fn path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".hostctrl").join("config.toml"))
    }

    /// Load config from disk
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// User that executes Host Agent commands
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or("sapadm")
    }

    /// Host Agent FQDN, defaults to the local host name
    pub fn fqdn(&self) -> String {
        self.fqdn.clone().unwrap_or_else(|| {
            hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "localhost".to_string())
        })
    }

    /// Connection options for the profile, with an optional host override
    pub fn connection_options(&self, fqdn: Option<&str>) -> ConnectionOptions {
        let fqdn = fqdn.map(str::to_string).unwrap_or_else(|| self.fqdn());
        ConnectionOptions::new(fqdn)
            .with_fallback(self.fallback.unwrap_or(true))
            .with_ports(
                self.https_port.unwrap_or(DEFAULT_HTTPS_PORT),
                self.http_port.unwrap_or(DEFAULT_HTTP_PORT),
            )
            .with_timeout(Duration::from_secs(
                self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .with_ca_bundle(self.ca_bundle.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.username(), "sapadm");

        let options = config.connection_options(Some("sap01.my.domain"));
        assert_eq!(options.fqdn, "sap01.my.domain");
        assert_eq!(options.https_port, 1129);
        assert!(options.fallback);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            username: Some("hostadm".to_string()),
            fqdn: Some("sap01.my.domain".to_string()),
            fallback: Some(false),
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(!loaded.connection_options(None).fallback);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(loaded, Config::default());
    }
}

//! Configuration module
//!
//! Handles loading and validating agent configuration from TOML files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::discovery::DiscoveryRequest;
use crate::agent::sda::SdaRequest;
use crate::connection::transport::{
    ConnectionOptions, DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT, DEFAULT_TIMEOUT_SECS,
};
use crate::hostagent::adapter::{Credentials, SldDestination};
use crate::hostagent::diagnostics::DiagnosticsOptions;
use crate::hostagent::DEFAULT_INSTALL_DIR;

/// Environment variable that overrides the Host Agent password
pub const PASSWORD_ENV: &str = "HOSTCTRL_PASSWORD";

/// Main configuration structure for the hostctrl agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Host Agent connection settings
    #[serde(default)]
    pub host_agent: HostAgentConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Declared states, applied in order
    #[serde(default)]
    pub states: Vec<StateConfig>,
}

/// Host Agent connection configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct HostAgentConfig {
    /// User that executes Host Agent commands
    #[serde(default = "default_username")]
    pub username: String,

    /// Password of `username`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// FQDN of the Host Agent
    #[serde(default = "default_fqdn")]
    pub fqdn: String,

    /// Fall back to HTTP if HTTPS fails
    #[serde(default = "default_true")]
    pub fallback: bool,

    #[serde(default = "default_https_port")]
    pub https_port: u16,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Additional PEM bundle of trusted certificates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<PathBuf>,

    /// Host Agent installation directory
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// A declared state
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateConfig {
    /// SAP system `name` is installed
    SystemInstalled {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    /// Outside discovery to SLD host `name` is configured and executed
    OutsideDiscoveryExecuted {
        name: String,
        sld_port: u16,
        sld_user: String,
        sld_password: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
        #[serde(default)]
        overwrite: bool,
        #[serde(default)]
        keep_other_config: bool,
    },
    /// The SDA archive `name` is deployed
    SdaInstalled {
        name: PathBuf,
        jvm_arch: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
        #[serde(default = "default_true")]
        verify: bool,
        #[serde(default)]
        overwrite: bool,
    },
}

// Default value functions
fn default_username() -> String {
    "sapadm".to_string()
}

fn default_fqdn() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "localhost".to_string())
}

fn default_true() -> bool {
    true
}

fn default_https_port() -> u16 {
    DEFAULT_HTTPS_PORT
}

fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_install_dir() -> PathBuf {
    PathBuf::from(DEFAULT_INSTALL_DIR)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for HostAgentConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: None,
            fqdn: default_fqdn(),
            fallback: default_true(),
            https_port: default_https_port(),
            http_port: default_http_port(),
            timeout_secs: default_timeout(),
            ca_bundle: None,
            install_dir: default_install_dir(),
        }
    }
}

impl std::fmt::Debug for HostAgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostAgentConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("fqdn", &self.fqdn)
            .field("fallback", &self.fallback)
            .field("https_port", &self.https_port)
            .field("http_port", &self.http_port)
            .field("timeout_secs", &self.timeout_secs)
            .field("ca_bundle", &self.ca_bundle)
            .field("install_dir", &self.install_dir)
            .finish()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl HostAgentConfig {
    /// Connection options for the SOAP service
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions::new(&self.fqdn)
            .with_fallback(self.fallback)
            .with_ports(self.https_port, self.http_port)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_ca_bundle(self.ca_bundle.clone())
    }

    /// Options for the diagnostics agent endpoints
    pub fn diagnostics_options(&self, verify: bool) -> DiagnosticsOptions {
        DiagnosticsOptions {
            base_url: format!("https://{}:{}", self.fqdn, self.https_port),
            verify,
            timeout: Duration::from_secs(self.timeout_secs),
            ca_bundle: self.ca_bundle.clone(),
        }
    }

    /// Credentials, with per-state overrides taking precedence
    pub fn credentials(&self, username: Option<&str>, password: Option<&str>) -> Result<Credentials> {
        let username = username.unwrap_or(&self.username);
        let Some(password) = password.or(self.password.as_deref()) else {
            bail!(
                "No password configured for {} (set host_agent.password or {})",
                username,
                PASSWORD_ENV
            );
        };
        Ok(Credentials::new(username, password))
    }
}

impl StateConfig {
    /// The state name shown in reports
    pub fn name(&self) -> String {
        match self {
            StateConfig::SystemInstalled { name, .. } => name.clone(),
            StateConfig::OutsideDiscoveryExecuted { name, .. } => name.clone(),
            StateConfig::SdaInstalled { name, .. } => name.display().to_string(),
        }
    }

    /// The state function name, e.g. `system_installed`
    pub fn kind(&self) -> &'static str {
        match self {
            StateConfig::SystemInstalled { .. } => "system_installed",
            StateConfig::OutsideDiscoveryExecuted { .. } => "outside_discovery_executed",
            StateConfig::SdaInstalled { .. } => "sda_installed",
        }
    }

    /// Per-state credential overrides
    pub fn credential_overrides(&self) -> (Option<&str>, Option<&str>) {
        match self {
            StateConfig::SystemInstalled { username, password, .. }
            | StateConfig::OutsideDiscoveryExecuted { username, password, .. }
            | StateConfig::SdaInstalled { username, password, .. } => {
                (username.as_deref(), password.as_deref())
            }
        }
    }

    /// Outside discovery request, if this is an outside discovery state
    pub fn discovery_request(&self, default_username: &str) -> Option<DiscoveryRequest> {
        match self {
            StateConfig::OutsideDiscoveryExecuted {
                name,
                sld_port,
                sld_user,
                sld_password,
                username,
                overwrite,
                keep_other_config,
                ..
            } => {
                let destination = SldDestination {
                    host: name.clone(),
                    port: *sld_port,
                    username: sld_user.clone(),
                    password: sld_password.clone(),
                };
                let mut request = DiscoveryRequest::new(
                    destination,
                    username.as_deref().unwrap_or(default_username),
                );
                request.overwrite = *overwrite;
                request.keep_other_config = *keep_other_config;
                Some(request)
            }
            _ => None,
        }
    }

    /// SDA request, if this is an SDA state
    pub fn sda_request(&self) -> Option<SdaRequest> {
        match self {
            StateConfig::SdaInstalled {
                name,
                jvm_arch,
                overwrite,
                ..
            } => {
                let mut request = SdaRequest::new(name, jvm_arch);
                request.overwrite = *overwrite;
                Some(request)
            }
            _ => None,
        }
    }

    /// Whether HTTPS certificates are verified for this state
    pub fn verify(&self) -> bool {
        match self {
            StateConfig::SdaInstalled { verify, .. } => *verify,
            _ => true,
        }
    }
}

impl std::fmt::Debug for StateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateConfig")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env();
        Ok(config)
    }

    /// Load the file if it exists, otherwise start from defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            let mut config = Self::default();
            config.apply_env();
            Ok(config)
        }
    }

    fn apply_env(&mut self) {
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            if !password.is_empty() {
                self.host_agent.password = Some(password);
            }
        }
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }
}

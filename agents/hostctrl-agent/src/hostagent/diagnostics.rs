//! Diagnostics Agent Client
//!
//! Talks to the Simple Diagnostics Agent (SDA) endpoints published by the Host Agent: a ping
//! service reporting the installed SDA version and a deployment endpoint accepting the SDA and
//! SAPJVM archives.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

use crate::connection::transport::{DEFAULT_HTTPS_PORT, DEFAULT_TIMEOUT_SECS};
use crate::hostagent::adapter::Credentials;
use crate::hostagent::error::{AgentError, AgentResult};

const PING_PATH: &str = "/lmsl/sda/default/?service=ping";
const DEPLOY_PATH: &str = "/SMDAgent/deploy";

/// Diagnostics agent trait - ping and deployment of the SDA
#[async_trait]
pub trait DiagnosticsAgent: Send + Sync {
    /// Query the ping service
    ///
    /// Returns the JSON document of a successful response, `None` when the service answered
    /// with an error status or a body that is not JSON.
    async fn ping(&self) -> AgentResult<Option<serde_json::Value>>;

    /// Upload the SDA and SAPJVM archives
    async fn deploy(&self, sda_archive: &Path, jvm_archive: &Path) -> AgentResult<()>;
}

/// Connection settings for the diagnostics agent endpoints
#[derive(Debug, Clone)]
pub struct DiagnosticsOptions {
    /// Base URL, e.g. `https://sap01.my.domain:1129`
    pub base_url: String,

    /// Verify the HTTPS certificate
    pub verify: bool,

    /// Per-request timeout
    pub timeout: Duration,

    /// Additional PEM bundle of trusted certificates
    pub ca_bundle: Option<PathBuf>,
}

impl DiagnosticsOptions {
    /// Options for the default HTTPS port of `fqdn`
    pub fn for_host(fqdn: &str) -> Self {
        Self {
            base_url: format!("https://{}:{}", fqdn, DEFAULT_HTTPS_PORT),
            verify: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            ca_bundle: None,
        }
    }

    /// Enable or disable certificate verification
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}

/// HTTP implementation of DiagnosticsAgent
#[derive(Debug, Clone)]
pub struct SdaClient {
    client: reqwest::Client,
    credentials: Credentials,
    base_url: String,
}

impl SdaClient {
    /// Create a new SDA client
    pub fn new(options: DiagnosticsOptions, credentials: Credentials) -> AgentResult<Self> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(!options.verify);

        if options.verify {
            if let Some(path) = &options.ca_bundle {
                let pem = std::fs::read(path).map_err(|source| AgentError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    AgentError::Malformed(format!("invalid CA bundle {}: {}", path.display(), e))
                })?;
                builder = builder.add_root_certificate(certificate);
            }
        }

        let client = builder.build().map_err(|source| AgentError::Transport {
            url: options.base_url.clone(),
            source,
        })?;

        Ok(Self {
            client,
            credentials,
            base_url: options.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn archive_part(path: &Path) -> AgentResult<Part> {
        let bytes = tokio::fs::read(path).await.map_err(|source| AgentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "archive.SAR".to_string());
        Ok(Part::bytes(bytes).file_name(file_name))
    }
}

#[async_trait]
impl DiagnosticsAgent for SdaClient {
    async fn ping(&self) -> AgentResult<Option<serde_json::Value>> {
        let url = format!("{}{}", self.base_url, PING_PATH);
        debug!(url = %url, "Checking if SDA is already installed");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .map_err(|source| AgentError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| AgentError::Transport {
            url: url.clone(),
            source,
        })?;
        trace!("Raw response:\n{}", text);

        if !status.is_success() {
            debug!(status = status.as_u16(), "SDA ping returned an error status");
            return Ok(None);
        }
        Ok(serde_json::from_str(&text).ok())
    }

    async fn deploy(&self, sda_archive: &Path, jvm_archive: &Path) -> AgentResult<()> {
        let url = format!("{}{}", self.base_url, DEPLOY_PATH);
        debug!(url = %url, sda = %sda_archive.display(), jvm = %jvm_archive.display(), "Uploading SDA");

        let form = Form::new()
            .part("sda-archive", Self::archive_part(sda_archive).await?)
            .part("jvm-archive", Self::archive_part(jvm_archive).await?);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .multipart(form)
            .send()
            .await
            .map_err(|source| AgentError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        trace!("Raw response:\n{}", text);

        if !status.is_success() {
            return Err(AgentError::Status {
                url,
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(())
    }
}

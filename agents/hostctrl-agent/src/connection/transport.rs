//! SOAP Transport
//!
//! Sets up an authenticated session with the SAPHostControl service. The session is established
//! over HTTPS first and, when allowed, falls back once to plain HTTP.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

use crate::connection::envelope::{self, Element, XmlNode};
use crate::hostagent::adapter::Credentials;
use crate::hostagent::error::{AgentError, AgentResult};

/// Default HTTPS port of the Host Agent
pub const DEFAULT_HTTPS_PORT: u16 = 1129;

/// Default HTTP port of the Host Agent
pub const DEFAULT_HTTP_PORT: u16 = 1128;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

const WSDL_PATH: &str = "/SAPHostControl/?wsdl";
const SERVICE_PATH: &str = "/SAPHostControl.cgi";

/// Transport scheme used by an established session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Https,
    Http,
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scheme::Https => write!(f, "https"),
            Scheme::Http => write!(f, "http"),
        }
    }
}

/// Where and how to reach the Host Agent
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// FQDN of the Host Agent
    pub fqdn: String,

    /// Port for HTTPS connections
    pub https_port: u16,

    /// Port for the HTTP fallback
    pub http_port: u16,

    /// Allow falling back to HTTP if no HTTPS connection can be created
    pub fallback: bool,

    /// Per-request timeout
    pub timeout: Duration,

    /// Additional PEM bundle of trusted certificates
    pub ca_bundle: Option<PathBuf>,
}

impl ConnectionOptions {
    /// Options with default ports, fallback enabled and the default timeout
    pub fn new(fqdn: impl Into<String>) -> Self {
        Self {
            fqdn: fqdn.into(),
            https_port: DEFAULT_HTTPS_PORT,
            http_port: DEFAULT_HTTP_PORT,
            fallback: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            ca_bundle: None,
        }
    }

    /// Enable or disable the HTTP fallback
    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    /// Set both ports
    pub fn with_ports(mut self, https_port: u16, http_port: u16) -> Self {
        self.https_port = https_port;
        self.http_port = http_port;
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Trust the certificates in an additional PEM bundle
    pub fn with_ca_bundle(mut self, ca_bundle: Option<PathBuf>) -> Self {
        self.ca_bundle = ca_bundle;
        self
    }

    fn base_url(&self, scheme: Scheme) -> String {
        let port = match scheme {
            Scheme::Https => self.https_port,
            Scheme::Http => self.http_port,
        };
        format!("{}://{}:{}", scheme, self.fqdn, port)
    }
}

/// Build an HTTP client for the given scheme
///
/// HTTPS clients verify certificates against the OS trust store and the optional CA bundle.
/// Clients for the fallback path do not verify certificates.
pub(crate) fn build_client(
    options: &ConnectionOptions,
    verify: bool,
) -> AgentResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(options.timeout)
        .danger_accept_invalid_certs(!verify);

    if verify {
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

    builder.build().map_err(|source| AgentError::Transport {
        url: options.fqdn.clone(),
        source,
    })
}

/// Whether an HTTP error was caused by certificate verification
pub(crate) fn is_certificate_error(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = source {
        if current.to_string().to_lowercase().contains("certificate") {
            return true;
        }
        source = current.source();
    }
    false
}

/// An authenticated session with the SAPHostControl service
#[derive(Debug)]
pub struct Session {
    client: reqwest::Client,
    credentials: Credentials,
    endpoint: String,
    scheme: Scheme,
}

impl Session {
    /// Connect to the Host Agent, falling back to HTTP if allowed
    pub async fn connect(options: &ConnectionOptions, credentials: &Credentials) -> AgentResult<Self> {
        let fqdn = &options.fqdn;

        match Self::try_connect(options, credentials, Scheme::Https).await {
            Ok(session) => return Ok(session),
            Err(e) => {
                debug!(error = %e, "Got an exception while connecting over HTTPS");
                match &e {
                    AgentError::Transport { source, .. } if is_certificate_error(source) => {
                        error!(fqdn = %fqdn, "Could not verify SSL certificate of {}", fqdn);
                    }
                    _ => error!(fqdn = %fqdn, "Cannot setup connection to Host Agent on {}", fqdn),
                }
            }
        }

        if !options.fallback {
            return Err(AgentError::Unavailable { fqdn: fqdn.clone() });
        }

        warn!(fqdn = %fqdn, "HTTPS connection failed, trying over an unsecure HTTP connection!");
        match Self::try_connect(options, credentials, Scheme::Http).await {
            Ok(session) => Ok(session),
            Err(e) => {
                debug!(error = %e, "Got an exception while connecting over HTTP");
                error!(fqdn = %fqdn, "Cannot setup connection to Host Agent on {}", fqdn);
                Err(AgentError::Unavailable { fqdn: fqdn.clone() })
            }
        }
    }

    async fn try_connect(
        options: &ConnectionOptions,
        credentials: &Credentials,
        scheme: Scheme,
    ) -> AgentResult<Self> {
        let client = build_client(options, scheme == Scheme::Https)?;
        let base_url = options.base_url(scheme);
        let wsdl_url = format!("{}{}", base_url, WSDL_PATH);
        debug!(url = %wsdl_url, "Retrieving services");

        let response = client
            .get(&wsdl_url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await
            .map_err(|source| AgentError::Transport {
                url: wsdl_url.clone(),
                source,
            })?;

        let status = response.status();
        let wsdl = response.text().await.map_err(|source| AgentError::Transport {
            url: wsdl_url.clone(),
            source,
        })?;
        if !status.is_success() {
            return Err(AgentError::Status {
                url: wsdl_url,
                status: status.as_u16(),
                body: wsdl,
            });
        }

        let endpoint = service_address(&wsdl, &options.fqdn)
            .unwrap_or_else(|| format!("{}{}", base_url, SERVICE_PATH));
        debug!(endpoint = %endpoint, scheme = %scheme, "Connected to Host Agent");

        Ok(Self {
            client,
            credentials: credentials.clone(),
            endpoint,
            scheme,
        })
    }

    /// The SOAP endpoint of this session
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The scheme the session was established with
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Call a service operation and return the operation's response element
    pub async fn call(&self, operation: &Element) -> AgentResult<XmlNode> {
        let payload = envelope::envelope(operation);
        trace!(operation = operation.name(), "Request:\n{}", payload);

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/xml; charset=utf-8"),
        );
        headers.insert("soapaction", HeaderValue::from_static("\"\""));

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .headers(headers)
            .body(payload)
            .send()
            .await
            .map_err(|source| AgentError::Transport {
                url: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| AgentError::Transport {
            url: self.endpoint.clone(),
            source,
        })?;
        trace!(operation = operation.name(), "Raw response:\n{}", text);

        let document = match XmlNode::parse(&text) {
            Ok(document) => document,
            Err(e) if status.is_success() => return Err(AgentError::Malformed(e)),
            Err(_) => {
                return Err(AgentError::Status {
                    url: self.endpoint.clone(),
                    status: status.as_u16(),
                    body: text,
                })
            }
        };

        let body = envelope::body(&document);
        if let Some(fault) = body.and_then(envelope::fault) {
            return Err(AgentError::Fault(fault));
        }
        if !status.is_success() {
            return Err(AgentError::Status {
                url: self.endpoint.clone(),
                status: status.as_u16(),
                body: text,
            });
        }
        let body =
            body.ok_or_else(|| AgentError::Malformed("response has no SOAP body".to_string()))?;

        let expected = format!("{}Response", operation.name());
        let response = body
            .child(&expected)
            .or_else(|| body.children.first())
            .cloned()
            .unwrap_or_else(|| XmlNode {
                name: expected,
                ..Default::default()
            });
        Ok(response)
    }
}

/// Extract the SOAP address from a service description
///
/// The first occurrence of `localhost` is replaced by `fqdn`, since the Host Agent publishes
/// its own address as localhost.
pub fn service_address(wsdl: &str, fqdn: &str) -> Option<String> {
    let document = XmlNode::parse(wsdl).ok()?;
    let address = find_address(&document)?;
    Some(address.replacen("localhost", fqdn, 1))
}

fn find_address(node: &XmlNode) -> Option<&str> {
    if node.name == "address" {
        if let Some(location) = node.attribute("location") {
            return Some(location);
        }
    }
    node.children.iter().find_map(find_address)
}

//! Host Agent Errors
//!
//! Error taxonomy shared by the SOAP client and the diagnostics agent client.

use thiserror::Error;

/// Errors raised while talking to the SAP Host Agent
#[derive(Debug, Error)]
pub enum AgentError {
    /// Neither the secure nor the fallback transport could be set up
    #[error("cannot setup connection to Host Agent on {fqdn}")]
    Unavailable { fqdn: String },

    /// The request could not be sent or no response arrived in time
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with an unexpected HTTP status
    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    /// The SOAP service reported a fault
    #[error("SOAP fault: {0}")]
    Fault(String),

    /// The response could not be parsed at all
    #[error("malformed response: {0}")]
    Malformed(String),

    /// A local file needed for the request could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl AgentError {
    /// Whether no transport at all could be established
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AgentError::Unavailable { .. })
    }
}

/// Result alias for Host Agent calls
pub type AgentResult<T> = Result<T, AgentError>;

//! hostctrl Agent Library
//!
//! This crate provides access to the SAP Host Agent (SOAP client with HTTPS to HTTP fallback,
//! diagnostics agent client) and the idempotent states built on top of it.

pub mod agent;
pub mod cli;
pub mod connection;
pub mod hostagent;

// Re-exports for convenience
pub use agent::{ChangeReport, Context, DiscoveryRequest, SdaRequest, StateHandler, StateResult};
pub use cli::config::Config;
pub use connection::transport::{ConnectionOptions, Session};
pub use hostagent::adapter::{Credentials, HostAgent, SldDestination};
pub use hostagent::diagnostics::{DiagnosticsAgent, SdaClient};
pub use hostagent::error::{AgentError, AgentResult};
pub use hostagent::soap::SoapAdapter;

//! Host Agent Adapter Trait
//!
//! Defines the operations the state layer needs from the SAP Host Agent, together with the
//! plain values they return.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hostagent::error::AgentResult;

/// Basic authentication credentials for the Host Agent services
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// One installed SAP instance of a system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub hostname: String,
    pub system_number: String,
}

/// A database system known to the Host Agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSystem {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub db_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_string: Option<String>,
    pub instances: Vec<DatabaseInstance>,
}

/// A single instance of a database system
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInstance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DatabaseInstance {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.host.is_none()
    }
}

/// Identifies a database for status, start and stop requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRef {
    /// Database name, usually the identifier, e.g. HAN
    pub name: String,
    /// Database type, e.g. ada, db6, hdb
    pub db_type: String,
}

impl DatabaseRef {
    pub fn new(name: impl Into<String>, db_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_type: db_type.into(),
        }
    }
}

/// SLD / LMDB destination used for outside discovery
#[derive(Clone, PartialEq, Eq)]
pub struct SldDestination {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SldDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SldDestination")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Host Agent adapter trait - the operations exposed by the SAPHostControl service
///
/// Listing operations return empty results when the response carries no usable data.
/// Mutating operations return `Ok(false)` when the service does not confirm success.
/// Errors are reserved for connection, transport and protocol failures.
#[async_trait]
pub trait HostAgent: Send + Sync {
    /// FQDN of the Host Agent this adapter talks to
    fn fqdn(&self) -> &str;

    /// List the SIDs of all installed SAP systems
    async fn list_systems(&self) -> AgentResult<Vec<String>>;

    /// List all instances of the system `sid`
    async fn list_instances(&self, sid: &str) -> AgentResult<Vec<InstanceInfo>>;

    /// List all database systems including their instances and connect strings
    async fn list_database_systems(&self) -> AgentResult<Vec<DatabaseSystem>>;

    /// Get the status of a database, `None` when the response carries no status
    async fn get_database_status(&self, database: &DatabaseRef) -> AgentResult<Option<String>>;

    /// Start a database
    async fn start_database(&self, database: &DatabaseRef) -> AgentResult<bool>;

    /// Stop a database
    async fn stop_database(&self, database: &DatabaseRef) -> AgentResult<bool>;

    /// Write the SLD configuration for outside discovery
    async fn configure_outside_discovery(&self, destination: &SldDestination)
        -> AgentResult<bool>;

    /// Run the outside discovery, i.e. send the data to the configured SLD
    async fn execute_outside_discovery(&self) -> AgentResult<bool>;
}

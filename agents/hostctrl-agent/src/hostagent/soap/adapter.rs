//! SOAP Adapter
//!
//! Implementation of HostAgent on top of the SAPHostControl SOAP service.

use async_trait::async_trait;
use tracing::{debug, error, trace, warn};

use crate::connection::envelope::{Element, XmlNode};
use crate::connection::transport::{ConnectionOptions, Session};
use crate::hostagent::adapter::{
    Credentials, DatabaseInstance, DatabaseRef, DatabaseSystem, HostAgent, InstanceInfo,
    SldDestination,
};
use crate::hostagent::error::AgentResult;

/// Remote timeout for database start/stop in seconds
pub const DATABASE_TIMEOUT_SECS: u64 = 300;

/// Remote soft timeout for database start/stop in seconds
pub const DATABASE_SOFT_TIMEOUT_SECS: u64 = 180;

const INSTALLED_STATUS: &str = "S-INSTALLED";
const EXECUTE_SLDREG_OPTION: &str = "OD-EXECUTESLDREG";

/// SAPHostControl SOAP adapter
///
/// Every operation opens its own session, so a single adapter can be reused freely.
#[derive(Debug, Clone)]
pub struct SoapAdapter {
    options: ConnectionOptions,
    credentials: Credentials,
}

impl SoapAdapter {
    /// Create a new SOAP adapter
    pub fn new(options: ConnectionOptions, credentials: Credentials) -> Self {
        Self {
            options,
            credentials,
        }
    }

    /// Connection options of this adapter
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Open a session, e.g. to verify credentials
    pub async fn connect(&self) -> AgentResult<Session> {
        Session::connect(&self.options, &self.credentials).await
    }

    async fn call(&self, operation: Element) -> AgentResult<XmlNode> {
        let session = self.connect().await?;
        debug!(operation = operation.name(), "Calling service");
        session.call(&operation).await
    }

    fn database_arguments(database: &DatabaseRef) -> Element {
        Element::new("aArguments")
            .with(Element::property("Database/Type", &database.db_type))
            .with(Element::property("Database/Name", &database.name))
    }

    fn database_options() -> Element {
        Element::new("aOptions")
            .with(Element::text("mTimeout", DATABASE_TIMEOUT_SECS))
            .with(Element::text("mSoftTimeout", DATABASE_SOFT_TIMEOUT_SECS))
            .with(Element::new("mOptions"))
    }

    fn list_instances_request() -> Element {
        Element::new("ListInstances")
            .with(Element::new("aSelector").with(Element::text("aInstanceStatus", INSTALLED_STATUS)))
    }
}

/// Items of the `result` list of a response, `None` when the response holds no list
fn result_items(response: &XmlNode) -> Option<Vec<&XmlNode>> {
    let result = response.child("result")?;
    let items: Vec<&XmlNode> = result.children_named("item").collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Payload of a response: its `result` element when that is the only child, the response itself otherwise
fn payload(response: &XmlNode) -> &XmlNode {
    match response.children.as_slice() {
        [only] if only.name == "result" => only,
        _ => response,
    }
}

/// Unique SIDs of a ListInstances response, in response order
pub fn parse_systems(response: &XmlNode) -> Vec<String> {
    let mut systems: Vec<String> = Vec::new();
    match result_items(response) {
        None => warn!("No systems found"),
        Some(items) => {
            for sid in items.iter().filter_map(|item| item.child_text("mSid")) {
                if !systems.iter().any(|s| s == sid) {
                    systems.push(sid.to_string());
                }
            }
        }
    }
    systems
}

/// Instances of `sid` in a ListInstances response
pub fn parse_instances(response: &XmlNode, sid: &str) -> Vec<InstanceInfo> {
    let Some(items) = result_items(response) else {
        warn!("No instances found");
        return Vec::new();
    };

    items
        .into_iter()
        .filter(|item| item.child_text("mSid") == Some(sid))
        .map(|item| InstanceInfo {
            hostname: item.child_text("mHostname").unwrap_or_default().to_string(),
            system_number: item.child_text("mSystemNumber").unwrap_or_default().to_string(),
        })
        .collect()
}

/// Database systems of a ListDatabaseSystems response
pub fn parse_database_systems(response: &XmlNode) -> Vec<DatabaseSystem> {
    let Some(items) = result_items(response) else {
        warn!("No database found");
        return Vec::new();
    };

    let mut result = Vec::new();
    for database in items {
        let mut name = None;
        let mut db = DatabaseSystem::default();

        if let Some(props) = database.child("mDatabase") {
            for (key, value) in props.properties() {
                match key {
                    "Database/Name" => name = Some(value.to_string()),
                    "Database/Type" => db.db_type = Some(value.to_string()),
                    "Database/Release" => db.version = Some(value.to_string()),
                    _ => {}
                }
            }
        }

        if let Some(props) = database.child("mProperties") {
            for (key, value) in props.properties() {
                if key == "ConnectAddress" {
                    db.connect_string = Some(value.to_string());
                }
            }
        }

        if let Some(instances) = database.child("mInstances") {
            for instance in instances.children_named("item") {
                let mut ins = DatabaseInstance::default();
                if let Some(props) = instance.child("mInstance") {
                    for (key, value) in props.properties() {
                        match key {
                            "Database/InstanceName" => ins.name = Some(value.to_string()),
                            "Database/Host" => ins.host = Some(value.to_string()),
                            _ => {}
                        }
                    }
                }
                if !ins.is_empty() {
                    db.instances.push(ins);
                }
            }
        }

        if let Some(name) = name {
            db.name = name;
            result.push(db);
        }
    }
    trace!(databases = ?result, "Processed result");
    result
}

/// Status value of a GetDatabaseStatus response
pub fn parse_database_status(response: &XmlNode) -> Option<String> {
    let status = payload(response)
        .child("status")
        .and_then(XmlNode::text)
        .map(str::to_string);
    if status.is_none() {
        error!("Could not determine database status");
    }
    status
}

/// Whether a StartDatabase / StopDatabase response confirms success of `operation`
pub fn operation_succeeded(response: &XmlNode, operation: &str) -> bool {
    let items: Vec<&XmlNode> = match payload(response).child("mOperationResults") {
        Some(results) => results.children_named("item").collect(),
        None => Vec::new(),
    };
    if items.is_empty() {
        error!(operation, "A timeout occurred");
        return false;
    }

    let expected = format!("{} successfully executed", operation);
    items.iter().any(|item| {
        item.child_text("mMessageKey") == Some("LogMsg/Text")
            && item.child_text("mMessageValue") == Some(expected.as_str())
    })
}

/// Look up a named property in the `mProperties` of a member
///
/// Returns `None` when the member carries no property of that name.
fn member_property<'a>(member: &'a XmlNode, name: &str) -> Option<Option<&'a str>> {
    let properties = member.child("mProperties")?;
    properties
        .children_named("item")
        .find(|item| item.child_text("mName") == Some(name))
        .map(|item| item.child_text("mValue"))
}

/// Whether a ConfigureOutsideDiscovery response reports SLD registration as enabled
///
/// The last member carrying an `SLDRegistration` property decides.
pub fn sld_registration_enabled(response: &XmlNode) -> bool {
    let mut success = false;
    let Some(members) = payload(response).child("mMembers") else {
        return success;
    };
    for member in &members.children {
        if let Some(value) = member_property(member, "SLDRegistration") {
            success = value.unwrap_or("ERROR") == "Enabled";
        }
    }
    success
}

/// Whether an ExecuteOutsideDiscovery response reports the SLD registration as OK
pub fn sldreg_status_ok(response: &XmlNode) -> bool {
    let mut success = false;
    for member in &payload(response).children {
        if let Some(value) = member_property(member, "SLDREGStatus") {
            success = value.unwrap_or("ERROR") == "OK";
        }
    }
    success
}

#[async_trait]
impl HostAgent for SoapAdapter {
    fn fqdn(&self) -> &str {
        &self.options.fqdn
    }

    async fn list_systems(&self) -> AgentResult<Vec<String>> {
        debug!("Running list_systems");
        let response = self.call(Self::list_instances_request()).await?;
        Ok(parse_systems(&response))
    }

    async fn list_instances(&self, sid: &str) -> AgentResult<Vec<InstanceInfo>> {
        debug!(sid, "Running list_instances");
        let response = self.call(Self::list_instances_request()).await?;
        Ok(parse_instances(&response, sid))
    }

    async fn list_database_systems(&self) -> AgentResult<Vec<DatabaseSystem>> {
        debug!("Running list_database_systems");
        let response = self
            .call(Element::new("ListDatabaseSystems").with(Element::new("aArguments")))
            .await?;
        Ok(parse_database_systems(&response))
    }

    async fn get_database_status(&self, database: &DatabaseRef) -> AgentResult<Option<String>> {
        debug!(database = %database.name, db_type = %database.db_type, "Running get_database_status");
        let response = self
            .call(Element::new("GetDatabaseStatus").with(Self::database_arguments(database)))
            .await?;
        Ok(parse_database_status(&response))
    }

    async fn start_database(&self, database: &DatabaseRef) -> AgentResult<bool> {
        debug!(database = %database.name, db_type = %database.db_type, "Running start_database");
        let response = self
            .call(
                Element::new("StartDatabase")
                    .with(Self::database_arguments(database))
                    .with(Self::database_options()),
            )
            .await?;
        Ok(operation_succeeded(&response, "StartDatabase"))
    }

    async fn stop_database(&self, database: &DatabaseRef) -> AgentResult<bool> {
        debug!(database = %database.name, db_type = %database.db_type, "Running stop_database");
        let response = self
            .call(
                Element::new("StopDatabase")
                    .with(Self::database_arguments(database))
                    .with(Self::database_options()),
            )
            .await?;
        Ok(operation_succeeded(&response, "StopDatabase"))
    }

    async fn configure_outside_discovery(
        &self,
        destination: &SldDestination,
    ) -> AgentResult<bool> {
        debug!(sld_host = %destination.host, sld_port = destination.port, "Running configure_outside_discovery");
        let item = Element::new("item")
            .with(Element::text("host", &destination.host))
            .with(Element::text("port", destination.port))
            .with(Element::text("username", &destination.username))
            .with(Element::text("password", &destination.password))
            .with(Element::text("useSSL", true));
        let configuration = Element::new("configuration")
            .with(Element::new("flags"))
            .with(Element::new("destinations").with(item))
            .with(Element::new("arguments"));

        let response = self
            .call(Element::new("ConfigureOutsideDiscovery").with(configuration))
            .await?;
        Ok(sld_registration_enabled(&response))
    }

    async fn execute_outside_discovery(&self) -> AgentResult<bool> {
        debug!("Running execute_outside_discovery");
        let request = Element::new("ExecuteOutsideDiscovery")
            .with(Element::new("aArguments"))
            .with(Element::new("mOptions").with(Element::text("item", EXECUTE_SLDREG_OPTION)));
        let response = self.call(request).await?;
        Ok(sldreg_status_ok(&response))
    }
}

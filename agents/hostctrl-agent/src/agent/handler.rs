//! State Handler
//!
//! Runs the idempotent Host Agent states against a HostAgent and DiagnosticsAgent.

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::agent::context::Context;
use crate::agent::report::{ChangeReport, StateResult};
use crate::hostagent::adapter::HostAgent;
use crate::hostagent::diagnostics::DiagnosticsAgent;

/// Handler for the Host Agent states
///
/// The outside discovery and SDA states live in `agent::discovery` and `agent::sda`.
pub struct StateHandler<A: HostAgent + ?Sized, D: DiagnosticsAgent + ?Sized> {
    pub(crate) agent: Arc<A>,
    pub(crate) diagnostics: Arc<D>,
    pub(crate) ctx: Context,
}

impl<A: HostAgent + ?Sized, D: DiagnosticsAgent + ?Sized> StateHandler<A, D> {
    /// Create a new state handler
    pub fn new(agent: Arc<A>, diagnostics: Arc<D>, ctx: Context) -> Self {
        Self {
            agent,
            diagnostics,
            ctx,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Ensure that the SAP system `name` is installed
    ///
    /// Only checks, never changes anything, so test mode behaves the same.
    pub async fn system_installed(&self, name: &str) -> ChangeReport {
        debug!(sid = %name, "Checking installed SAP systems");
        let report = ChangeReport::new(name);

        let systems = match self.agent.list_systems().await {
            Ok(systems) => systems,
            Err(e) => {
                error!(sid = %name, error = %e, "Could not list SAP systems");
                return report.fail(format!("Could not list SAP systems: {}", e));
            }
        };
        debug!(systems = ?systems, "Installed SAP systems");

        if systems.iter().any(|sid| sid == name) {
            info!(sid = %name, "SAP system is installed");
            report.finish(StateResult::Success, format!("SAP system {} is installed", name))
        } else {
            error!(sid = %name, "SAP system is not installed");
            report.fail(format!("SAP system {} is not installed", name))
        }
    }
}

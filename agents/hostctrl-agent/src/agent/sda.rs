//! Simple Diagnostics Agent State
//!
//! Ensures that the Simple Diagnostics Agent (SDA) is deployed on the Host Agent.

use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{debug, error, info};

use crate::agent::handler::StateHandler;
use crate::agent::report::{ChangeReport, StateResult};
use crate::hostagent::adapter::HostAgent;
use crate::hostagent::diagnostics::DiagnosticsAgent;

/// Desired SDA installation
#[derive(Debug, Clone)]
pub struct SdaRequest {
    /// SDA SAR archive, also the report name
    pub archive: PathBuf,
    /// SAPJVM SAR archive
    pub jvm_archive: PathBuf,
    /// Deploy even if an SDA answers the ping
    pub overwrite: bool,
}

impl SdaRequest {
    pub fn new(archive: impl Into<PathBuf>, jvm_archive: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            jvm_archive: jvm_archive.into(),
            overwrite: false,
        }
    }
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)^\s*v?",
            r"(?:[0-9]+!)?",
            r"[0-9]+(?:\.[0-9]+)*",
            r"(?:[-_.]?(?:a|b|c|rc|alpha|beta|pre|preview)[-_.]?[0-9]*)?",
            r"(?:-[0-9]+|[-_.]?(?:post|rev|r)[-_.]?[0-9]*)?",
            r"(?:[-_.]?dev[-_.]?[0-9]*)?",
            r"(?:\+[a-z0-9]+(?:[-_.][a-z0-9]+)*)?",
            r"\s*$",
        ))
        .expect("valid version regex")
    })
}

/// Whether `value` is a PEP 440 version string
pub fn is_version(value: &str) -> bool {
    version_regex().is_match(value)
}

/// The reported version if the ping response carries a valid `software` version
fn installed_version(ping: &serde_json::Value) -> Option<&str> {
    ping.get("software")
        .and_then(|software| software.as_str())
        .filter(|software| is_version(software))
}

impl<A: HostAgent + ?Sized, D: DiagnosticsAgent + ?Sized> StateHandler<A, D> {
    /// Ensure that the SDA from `request.archive` is deployed
    pub async fn sda_installed(&self, request: &SdaRequest) -> ChangeReport {
        let mut report = ChangeReport::new(request.archive.display().to_string());

        if !request.overwrite {
            debug!("Checking if SDA is already installed");
            match self.diagnostics.ping().await {
                Ok(Some(ping)) => {
                    if let Some(version) = installed_version(&ping) {
                        info!(version = %version, "SDA is already installed");
                        return report.unchanged(StateResult::Success, "No changes required");
                    }
                    debug!("Ping response carries no SDA version");
                }
                Ok(None) => debug!("SDA did not answer the ping"),
                Err(e) => debug!(error = %e, "SDA ping failed"),
            }
        }

        debug!(overwrite = request.overwrite, "Installing SDA");
        if request.overwrite {
            report.old("SDA was perhaps installed");
        } else {
            report.old("SDA was not installed");
        }

        if self.ctx.test {
            report.new_state("SDA would be installed");
            return report.finish(StateResult::NoOp, "");
        }

        match self
            .diagnostics
            .deploy(&request.archive, &request.jvm_archive)
            .await
        {
            Ok(()) => {
                info!(archive = %request.archive.display(), "Installed SDA");
                report.new_state("SDA is installed");
                report.finish(StateResult::Success, "Installed SDA")
            }
            Err(e) => {
                error!(error = %e, "Could not upload SDA");
                report.unchanged(StateResult::Failure, "Could not install SDA")
            }
        }
    }
}

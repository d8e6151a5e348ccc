//! Outside Discovery State
//!
//! Ensures that the Host Agent is registered at an SLD/LMDB through outside discovery and that
//! the discovery ran successfully at least once.

use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::agent::handler::StateHandler;
use crate::agent::report::{ChangeReport, StateResult};
use crate::agent::runner::CommandSpec;
use crate::agent::sldreg::{self, ShowConnect};
use crate::agent::state::{DiscoveryState, DiscoveryTracker};
use crate::hostagent::adapter::{HostAgent, SldDestination};
use crate::hostagent::diagnostics::DiagnosticsAgent;

/// Desired outside discovery configuration
#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    /// SLD host, also the report name
    pub destination: SldDestination,
    /// OS user that runs `sldreg`
    pub username: String,
    /// Reconfigure even if the existing configuration matches
    pub overwrite: bool,
    /// Leave other `slddest_*.cfg` files alone
    pub keep_other_config: bool,
}

impl DiscoveryRequest {
    pub fn new(destination: SldDestination, username: impl Into<String>) -> Self {
        Self {
            destination,
            username: username.into(),
            overwrite: false,
            keep_other_config: false,
        }
    }

    /// File name of the destination configuration, `slddest_{host}_{port}.cfg`
    pub fn config_file_name(&self) -> String {
        format!(
            "slddest_{}_{}.cfg",
            self.destination.host, self.destination.port
        )
    }
}

fn is_sld_config(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with("slddest_") && name.ends_with(".cfg"))
        .unwrap_or(false)
}

/// All `slddest_*.cfg` files in `dir` except `keep`, sorted
async fn other_sld_configs(dir: &Path, keep: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut configs = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(configs),
        Err(e) => return Err(e),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_sld_config(&path) && path != keep {
            configs.push(path);
        }
    }
    configs.sort();
    Ok(configs)
}

impl<A: HostAgent + ?Sized, D: DiagnosticsAgent + ?Sized> StateHandler<A, D> {
    /// Ensure that outside discovery is configured for `request.destination` and was executed
    pub async fn outside_discovery_executed(&self, request: &DiscoveryRequest) -> ChangeReport {
        let destination = &request.destination;
        let mut report = ChangeReport::new(&destination.host);
        let mut tracker = DiscoveryTracker::new();

        let config_dir = self.ctx.config_dir();
        let config = config_dir.join(request.config_file_name());
        let log_file = self.ctx.discovery_log();

        info!(
            sld_host = %destination.host,
            sld_port = destination.port,
            test = self.ctx.test,
            "Ensuring outside discovery is executed"
        );

        if !request.keep_other_config {
            debug!(dir = %config_dir.display(), "Checking for other SLD configurations");
            let others = match other_sld_configs(&config_dir, &config).await {
                Ok(others) => others,
                Err(e) => {
                    error!(dir = %config_dir.display(), error = %e, "Cannot list SLD configurations");
                    return report.fail(format!(
                        "Cannot list SLD configurations in {}: {}",
                        config_dir.display(),
                        e
                    ));
                }
            };
            for other in others {
                if self.ctx.test {
                    report.old(format!("Would remove {}", other.display()));
                    continue;
                }
                if let Err(e) = tokio::fs::remove_file(&other).await {
                    error!(path = %other.display(), error = %e, "Cannot remove SLD configuration");
                    return report.fail(format!("Cannot remove {}: {}", other.display(), e));
                }
                report.old(format!("Removed {}", other.display()));
            }
        }
        tracker.transition_to(DiscoveryState::ConfiguredUnverified, None);

        debug!(config = %config.display(), "Checking existing outside discovery configuration");
        let mut configured = false;
        if tokio::fs::try_exists(&config).await.unwrap_or(false) {
            let exe_dir = self.ctx.exe_dir();
            let spec = CommandSpec::new(exe_dir.join("sldreg").display().to_string())
                .arg("-showconnect")
                .arg(config.display().to_string())
                .runas(&request.username)
                .env("LD_LIBRARY_PATH", exe_dir.display().to_string());

            let output = match self.ctx.runner.run(&spec).await {
                Ok(output) if output.success() => output,
                Ok(output) => {
                    error!(retcode = output.retcode, stderr = %output.stderr, "sldreg -showconnect failed");
                    return report.fail(format!(
                        "Cannot read SLD configuration {}: sldreg returned {}",
                        config.display(),
                        output.retcode
                    ));
                }
                Err(e) => {
                    error!(error = %e, "Cannot run sldreg");
                    return report.fail(format!(
                        "Cannot read SLD configuration {}: {:#}",
                        config.display(),
                        e
                    ));
                }
            };
            configured = ShowConnect::parse(&output.stdout).matches(destination);
        }

        if configured {
            report.old("Outside Discovery is configured correctly");
            tracker.transition_to(DiscoveryState::ConfiguredMatching, None);
        } else {
            report.old("Outside Discovery is not configured correctly");
            tracker.transition_to(DiscoveryState::ConfiguredMismatched, None);
        }

        if request.overwrite || !configured {
            if self.ctx.test {
                report.new_state("Outside Discovery would be configured");
            } else {
                debug!(sld_host = %destination.host, "Configuring outside discovery");
                match self.agent.configure_outside_discovery(destination).await {
                    Ok(true) => report.new_state("Outside Discovery is configured"),
                    Ok(false) => {
                        let msg = "Cannot configure SAP Host Agent to use outside discovery";
                        error!("{}", msg);
                        return report.fail(msg);
                    }
                    Err(e) => {
                        error!(error = %e, "Cannot configure SAP Host Agent to use outside discovery");
                        return report
                            .fail("Cannot configure SAP Host Agent to use outside discovery");
                    }
                }
            }
            tracker.transition_to(
                DiscoveryState::ConfiguredMatching,
                Some("configured".to_string()),
            );
            tracker.transition_to(DiscoveryState::NotExecuted, None);
        } else {
            // The log is only written with `service/trace = 2` in the host profile
            debug!(log = %log_file.display(), "Checking for a successful outside discovery");
            let executed = match tokio::fs::read_to_string(&log_file).await {
                Ok(log) => sldreg::discovery_succeeded(&log),
                Err(e) => {
                    debug!(log = %log_file.display(), error = %e, "Cannot read outside discovery log");
                    false
                }
            };

            if executed {
                tracker.transition_to(DiscoveryState::AlreadyExecuted, None);
                info!(sld_host = %destination.host, "Outside discovery was already executed");
                return report.unchanged(StateResult::NoOp, "No changes required");
            }
            report.old("Outside Discovery was not yet executed successfully");
            tracker.transition_to(DiscoveryState::NotExecuted, None);
        }

        debug!(log = %log_file.display(), "Removing old outside discovery log");
        if self.ctx.test {
            report.old(format!("Would remove {}", log_file.display()));
        } else {
            match tokio::fs::remove_file(&log_file).await {
                Ok(()) => report.old(format!("Removed {}", log_file.display())),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(log = %log_file.display(), error = %e, "Cannot remove outside discovery log"),
            }
        }

        if self.ctx.test {
            report.new_state("Outside discovery would be executed");
            return report.finish(
                StateResult::NoOp,
                "Outside discovery would be maintained and executed",
            );
        }

        debug!("Executing outside discovery");
        let executed = match self.agent.execute_outside_discovery().await {
            Ok(executed) => executed,
            Err(e) => {
                error!(error = %e, "Cannot execute outside discovery");
                false
            }
        };

        let outcome = if executed {
            DiscoveryState::ExecutedSuccess
        } else {
            DiscoveryState::ExecutedFailure
        };
        tracker.transition_to(outcome, None);
        debug!(transitions = ?tracker.transitions(), "Outside discovery state history");

        if executed {
            info!(path = ?tracker.path(), "Outside discovery was executed");
            report.new_state("Outside discovery was executed successfully");
            report.finish(
                StateResult::Success,
                "Outside discovery configuration is maintained and was executed successfully",
            )
        } else {
            error!("Cannot execute outside discovery");
            report.fail("Outside discovery configuration is maintained but execution failed")
        }
    }
}

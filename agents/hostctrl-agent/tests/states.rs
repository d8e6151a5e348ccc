use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hostctrl_agent::agent::runner::{CommandOutput, CommandRunner, CommandSpec};
use hostctrl_agent::hostagent::adapter::{
    DatabaseRef, DatabaseSystem, HostAgent, InstanceInfo, SldDestination,
};
use hostctrl_agent::hostagent::diagnostics::DiagnosticsAgent;
use hostctrl_agent::{
    AgentError, AgentResult, ChangeReport, Context, DiscoveryRequest, SdaRequest, StateHandler,
    StateResult,
};

const SLD_HOST: &str = "sld.my.domain";
const SLD_PORT: u16 = 50000;

/// Host Agent double; `systems: None` behaves like an unreachable Host Agent
#[derive(Default)]
struct MockAgent {
    systems: Option<Vec<String>>,
    configure_unavailable: bool,
    configure_ok: bool,
    execute_ok: bool,
    configure_calls: AtomicUsize,
    execute_calls: AtomicUsize,
}

impl MockAgent {
    fn unavailable() -> AgentError {
        AgentError::Unavailable {
            fqdn: "sap01.my.domain".to_string(),
        }
    }
}

#[async_trait]
impl HostAgent for MockAgent {
    fn fqdn(&self) -> &str {
        "sap01.my.domain"
    }

    async fn list_systems(&self) -> AgentResult<Vec<String>> {
        self.systems.clone().ok_or_else(Self::unavailable)
    }

    async fn list_instances(&self, _sid: &str) -> AgentResult<Vec<InstanceInfo>> {
        Ok(Vec::new())
    }

    async fn list_database_systems(&self) -> AgentResult<Vec<DatabaseSystem>> {
        Ok(Vec::new())
    }

    async fn get_database_status(&self, _database: &DatabaseRef) -> AgentResult<Option<String>> {
        Ok(None)
    }

    async fn start_database(&self, _database: &DatabaseRef) -> AgentResult<bool> {
        Ok(false)
    }

    async fn stop_database(&self, _database: &DatabaseRef) -> AgentResult<bool> {
        Ok(false)
    }

    async fn configure_outside_discovery(&self, _destination: &SldDestination) -> AgentResult<bool> {
        self.configure_calls.fetch_add(1, Ordering::SeqCst);
        if self.configure_unavailable {
            return Err(Self::unavailable());
        }
        Ok(self.configure_ok)
    }

    async fn execute_outside_discovery(&self) -> AgentResult<bool> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        if self.systems.is_none() {
            return Err(Self::unavailable());
        }
        Ok(self.execute_ok)
    }
}

#[derive(Default)]
struct MockDiagnostics {
    ping: Option<serde_json::Value>,
    ping_fails: bool,
    deploy_ok: bool,
    ping_calls: AtomicUsize,
    deploy_calls: AtomicUsize,
}

#[async_trait]
impl DiagnosticsAgent for MockDiagnostics {
    async fn ping(&self) -> AgentResult<Option<serde_json::Value>> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        if self.ping_fails {
            return Err(AgentError::Status {
                url: "https://sap01.my.domain:1129/SMDAgent/ping".to_string(),
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.ping.clone())
    }

    async fn deploy(&self, _sda_archive: &Path, _jvm_archive: &Path) -> AgentResult<()> {
        self.deploy_calls.fetch_add(1, Ordering::SeqCst);
        if self.deploy_ok {
            Ok(())
        } else {
            Err(AgentError::Status {
                url: "https://sap01.my.domain:1129/SMDAgent/deploy".to_string(),
                status: 500,
                body: "deployment failed".to_string(),
            })
        }
    }
}

/// Records commands and answers every one with the same output
struct MockRunner {
    output: CommandOutput,
    commands: Mutex<Vec<CommandSpec>>,
}

impl MockRunner {
    fn new(retcode: i32, stdout: &str) -> Self {
        Self {
            output: CommandOutput {
                retcode,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
            commands: Mutex::new(Vec::new()),
        }
    }

    fn executed_commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, spec: &CommandSpec) -> anyhow::Result<CommandOutput> {
        self.commands.lock().unwrap().push(spec.clone());
        Ok(self.output.clone())
    }
}

fn showconnect(host: &str, port: u16, user: &str, https: &str) -> String {
    format!(
        "Connection parameters:\n  host_param='{}'\n  port_param='{}'\n  user_param='{}'\n  https_param='{}'\n",
        host, port, user, https
    )
}

/// Temporary Host Agent installation tree
struct InstallDir {
    dir: tempfile::TempDir,
}

impl InstallDir {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("exe/config.d")).unwrap();
        std::fs::create_dir_all(dir.path().join("work")).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self, name: &str) -> PathBuf {
        self.path().join("exe/config.d").join(name)
    }

    fn target_config(&self) -> PathBuf {
        self.config(&format!("slddest_{}_{}.cfg", SLD_HOST, SLD_PORT))
    }

    fn log(&self) -> PathBuf {
        self.path().join("work/outsidediscovery.log")
    }

    fn write(&self, path: &Path, content: &str) {
        std::fs::write(path, content).unwrap();
    }
}

fn handler(
    agent: &Arc<MockAgent>,
    diagnostics: &Arc<MockDiagnostics>,
    runner: &Arc<MockRunner>,
    install: &InstallDir,
    test: bool,
) -> StateHandler<MockAgent, MockDiagnostics> {
    let ctx = Context::new()
        .with_test(test)
        .with_install_dir(install.path())
        .with_runner(runner.clone());
    StateHandler::new(agent.clone(), diagnostics.clone(), ctx)
}

fn discovery_request() -> DiscoveryRequest {
    DiscoveryRequest::new(
        SldDestination {
            host: SLD_HOST.to_string(),
            port: SLD_PORT,
            username: "SLD_DS_USER".to_string(),
            password: "sld-secret".to_string(),
        },
        "sapadm",
    )
}

fn working_agent() -> Arc<MockAgent> {
    Arc::new(MockAgent {
        systems: Some(vec!["S4H".to_string()]),
        configure_ok: true,
        execute_ok: true,
        ..Default::default()
    })
}

fn matching_runner() -> Arc<MockRunner> {
    Arc::new(MockRunner::new(
        0,
        &showconnect(SLD_HOST, SLD_PORT, "SLD_DS_USER", "y"),
    ))
}

// system_installed

#[tokio::test]
async fn test_system_installed() {
    let install = InstallDir::new();
    let handler = handler(
        &working_agent(),
        &Arc::new(MockDiagnostics::default()),
        &matching_runner(),
        &install,
        false,
    );

    let report = handler.system_installed("S4H").await;
    assert_eq!(report.result, StateResult::Success);
    assert_eq!(report.comment, "SAP system S4H is installed");
    assert!(report.changes.is_empty());

    let report = handler.system_installed("NW1").await;
    assert_eq!(report.result, StateResult::Failure);
    assert_eq!(report.comment, "SAP system NW1 is not installed");
}

#[tokio::test]
async fn test_system_installed_unavailable_is_a_failure_report() {
    let install = InstallDir::new();
    let agent = Arc::new(MockAgent::default());
    let handler = handler(
        &agent,
        &Arc::new(MockDiagnostics::default()),
        &matching_runner(),
        &install,
        false,
    );

    let report = handler.system_installed("S4H").await;
    assert!(report.is_failure());
    assert!(report.comment.starts_with("Could not list SAP systems"));
}

// outside_discovery_executed

#[tokio::test]
async fn test_discovery_dry_run_changes_nothing() {
    let install = InstallDir::new();
    let other = install.config("slddest_old.my.domain_50000.cfg");
    install.write(&other, "old");
    install.write(&install.log(), "Return code: 500\n");
    let agent = working_agent();
    let runner = matching_runner();
    let handler = handler(&agent, &Arc::new(MockDiagnostics::default()), &runner, &install, true);

    let report = handler.outside_discovery_executed(&discovery_request()).await;

    assert_eq!(report.result, StateResult::NoOp);
    assert_eq!(report.comment, "Outside discovery would be maintained and executed");
    assert_eq!(
        report.changes.old,
        vec![
            format!("Would remove {}", other.display()),
            "Outside Discovery is not configured correctly".to_string(),
            format!("Would remove {}", install.log().display()),
        ]
    );
    assert_eq!(
        report.changes.new,
        vec![
            "Outside Discovery would be configured".to_string(),
            "Outside discovery would be executed".to_string(),
        ]
    );
    assert!(report.changes.new.iter().all(|entry| entry.contains("would")));

    assert_eq!(agent.configure_calls.load(Ordering::SeqCst), 0);
    assert_eq!(agent.execute_calls.load(Ordering::SeqCst), 0);
    assert!(other.exists());
    assert!(install.log().exists());
    // No target configuration, so sldreg is never consulted
    assert!(runner.executed_commands().is_empty());
}

#[tokio::test]
async fn test_discovery_already_executed_is_noop() {
    let install = InstallDir::new();
    install.write(&install.target_config(), "");
    install.write(&install.log(), "Return code: 500\n...\nReturn code: 200\n");
    let agent = working_agent();
    let runner = matching_runner();
    let handler = handler(&agent, &Arc::new(MockDiagnostics::default()), &runner, &install, false);

    let report = handler.outside_discovery_executed(&discovery_request()).await;

    assert_eq!(report.result, StateResult::NoOp);
    assert_eq!(report.comment, "No changes required");
    assert!(report.changes.is_empty());
    assert_eq!(agent.configure_calls.load(Ordering::SeqCst), 0);
    assert_eq!(agent.execute_calls.load(Ordering::SeqCst), 0);

    let commands = runner.executed_commands();
    assert_eq!(commands.len(), 1);
    let exe_dir = install.path().join("exe");
    assert_eq!(commands[0].program, exe_dir.join("sldreg").display().to_string());
    assert_eq!(commands[0].args[0], "-showconnect");
    assert_eq!(commands[0].args[1], install.target_config().display().to_string());
    assert_eq!(commands[0].runas.as_deref(), Some("sapadm"));
    assert_eq!(
        commands[0].env,
        vec![("LD_LIBRARY_PATH".to_string(), exe_dir.display().to_string())]
    );
}

#[tokio::test]
async fn test_discovery_matching_config_reexecutes_without_reconfigure() {
    let install = InstallDir::new();
    install.write(&install.target_config(), "");
    install.write(&install.log(), "Return code: 200\nReturn code: 401\n");
    let agent = working_agent();
    let handler = handler(
        &agent,
        &Arc::new(MockDiagnostics::default()),
        &matching_runner(),
        &install,
        false,
    );

    let report = handler.outside_discovery_executed(&discovery_request()).await;

    assert_eq!(report.result, StateResult::Success);
    assert_eq!(
        report.comment,
        "Outside discovery configuration is maintained and was executed successfully"
    );
    assert_eq!(
        report.changes.old,
        vec![
            "Outside Discovery is configured correctly".to_string(),
            "Outside Discovery was not yet executed successfully".to_string(),
            format!("Removed {}", install.log().display()),
        ]
    );
    assert_eq!(report.changes.new, vec!["Outside discovery was executed successfully"]);
    assert_eq!(agent.configure_calls.load(Ordering::SeqCst), 0);
    assert_eq!(agent.execute_calls.load(Ordering::SeqCst), 1);
    assert!(!install.log().exists());
}

#[tokio::test]
async fn test_discovery_missing_log_means_not_executed() {
    let install = InstallDir::new();
    install.write(&install.target_config(), "");
    let agent = working_agent();
    let handler = handler(
        &agent,
        &Arc::new(MockDiagnostics::default()),
        &matching_runner(),
        &install,
        false,
    );

    let report = handler.outside_discovery_executed(&discovery_request()).await;

    assert_eq!(report.result, StateResult::Success);
    assert_eq!(agent.execute_calls.load(Ordering::SeqCst), 1);
    // Nothing to remove
    assert!(!report.changes.old.iter().any(|entry| entry.starts_with("Removed")));
}

#[tokio::test]
async fn test_discovery_mismatch_reconfigures_and_removes_other_configs() {
    let install = InstallDir::new();
    let other = install.config("slddest_old.my.domain_50000.cfg");
    install.write(&other, "old");
    install.write(&install.target_config(), "");
    let agent = working_agent();
    let runner = Arc::new(MockRunner::new(
        0,
        &showconnect(SLD_HOST, SLD_PORT, "SLD_DS_USER", "n"),
    ));
    let handler = handler(&agent, &Arc::new(MockDiagnostics::default()), &runner, &install, false);

    let report = handler.outside_discovery_executed(&discovery_request()).await;

    assert_eq!(report.result, StateResult::Success);
    assert_eq!(report.changes.old[0], format!("Removed {}", other.display()));
    assert_eq!(report.changes.old[1], "Outside Discovery is not configured correctly");
    assert_eq!(
        report.changes.new,
        vec![
            "Outside Discovery is configured".to_string(),
            "Outside discovery was executed successfully".to_string(),
        ]
    );
    assert_eq!(agent.configure_calls.load(Ordering::SeqCst), 1);
    assert!(!other.exists());
    assert!(install.target_config().exists());
}

#[tokio::test]
async fn test_discovery_keep_other_config_and_overwrite() {
    let install = InstallDir::new();
    let other = install.config("slddest_old.my.domain_50000.cfg");
    install.write(&other, "old");
    install.write(&install.target_config(), "");
    install.write(&install.log(), "Return code: 200\n");
    let agent = working_agent();
    let handler = handler(
        &agent,
        &Arc::new(MockDiagnostics::default()),
        &matching_runner(),
        &install,
        false,
    );
    let mut request = discovery_request();
    request.keep_other_config = true;
    request.overwrite = true;

    let report = handler.outside_discovery_executed(&request).await;

    assert_eq!(report.result, StateResult::Success);
    assert_eq!(report.changes.old[0], "Outside Discovery is configured correctly");
    assert_eq!(agent.configure_calls.load(Ordering::SeqCst), 1);
    assert_eq!(agent.execute_calls.load(Ordering::SeqCst), 1);
    assert!(other.exists());
}

#[tokio::test]
async fn test_discovery_configure_failure() {
    let install = InstallDir::new();
    let agent = Arc::new(MockAgent {
        systems: Some(Vec::new()),
        configure_ok: false,
        execute_ok: true,
        ..Default::default()
    });
    let handler = handler(
        &agent,
        &Arc::new(MockDiagnostics::default()),
        &matching_runner(),
        &install,
        false,
    );

    let report = handler.outside_discovery_executed(&discovery_request()).await;

    assert_eq!(report.result, StateResult::Failure);
    assert_eq!(report.comment, "Cannot configure SAP Host Agent to use outside discovery");
    assert_eq!(agent.execute_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_discovery_configure_transport_failure_is_a_failure_report() {
    let install = InstallDir::new();
    let agent = Arc::new(MockAgent {
        systems: Some(Vec::new()),
        configure_unavailable: true,
        execute_ok: true,
        ..Default::default()
    });
    let handler = handler(
        &agent,
        &Arc::new(MockDiagnostics::default()),
        &matching_runner(),
        &install,
        false,
    );

    let report = handler.outside_discovery_executed(&discovery_request()).await;

    assert_eq!(report.result, StateResult::Failure);
    assert_eq!(report.comment, "Cannot configure SAP Host Agent to use outside discovery");
    assert_eq!(agent.configure_calls.load(Ordering::SeqCst), 1);
    assert_eq!(agent.execute_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_discovery_execute_transport_failure_is_a_failure_report() {
    let install = InstallDir::new();
    install.write(&install.target_config(), "");
    let agent = Arc::new(MockAgent {
        systems: None,
        configure_ok: true,
        execute_ok: true,
        ..Default::default()
    });
    let handler = handler(
        &agent,
        &Arc::new(MockDiagnostics::default()),
        &matching_runner(),
        &install,
        false,
    );

    let report = handler.outside_discovery_executed(&discovery_request()).await;

    assert_eq!(report.result, StateResult::Failure);
    assert_eq!(
        report.comment,
        "Outside discovery configuration is maintained but execution failed"
    );
}

#[tokio::test]
async fn test_discovery_sldreg_failure() {
    let install = InstallDir::new();
    install.write(&install.target_config(), "");
    let agent = working_agent();
    let runner = Arc::new(MockRunner::new(1, ""));
    let handler = handler(&agent, &Arc::new(MockDiagnostics::default()), &runner, &install, false);

    let report = handler.outside_discovery_executed(&discovery_request()).await;

    assert!(report.is_failure());
    assert!(report.comment.starts_with("Cannot read SLD configuration"));
    assert_eq!(agent.configure_calls.load(Ordering::SeqCst), 0);
}

// sda_installed

fn sda_request() -> SdaRequest {
    SdaRequest::new(
        "/mnt/nfs/SIMDIAGAGNT1SP60P_3-70002252.SAR",
        "/mnt/nfs/SAPJVM8_90-80000202.SAR",
    )
}

async fn run_sda(diagnostics: &Arc<MockDiagnostics>, request: &SdaRequest, test: bool) -> ChangeReport {
    let install = InstallDir::new();
    handler(&working_agent(), diagnostics, &matching_runner(), &install, test)
        .sda_installed(request)
        .await
}

#[tokio::test]
async fn test_sda_already_installed_skips_upload() {
    let diagnostics = Arc::new(MockDiagnostics {
        ping: Some(serde_json::json!({"software": "1.60.3"})),
        deploy_ok: true,
        ..Default::default()
    });

    let report = run_sda(&diagnostics, &sda_request(), false).await;

    assert_eq!(report.result, StateResult::Success);
    assert_eq!(report.comment, "No changes required");
    assert!(report.changes.is_empty());
    assert_eq!(diagnostics.deploy_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sda_installs_when_version_unparseable() {
    let diagnostics = Arc::new(MockDiagnostics {
        ping: Some(serde_json::json!({"software": "unknown"})),
        deploy_ok: true,
        ..Default::default()
    });

    let report = run_sda(&diagnostics, &sda_request(), false).await;

    assert_eq!(report.result, StateResult::Success);
    assert_eq!(report.comment, "Installed SDA");
    assert_eq!(report.changes.old, vec!["SDA was not installed"]);
    assert_eq!(report.changes.new, vec!["SDA is installed"]);
    assert_eq!(diagnostics.deploy_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sda_overwrite_skips_ping() {
    let diagnostics = Arc::new(MockDiagnostics {
        ping: Some(serde_json::json!({"software": "1.60.3"})),
        deploy_ok: true,
        ..Default::default()
    });
    let mut request = sda_request();
    request.overwrite = true;

    let report = run_sda(&diagnostics, &request, false).await;

    assert_eq!(report.result, StateResult::Success);
    assert_eq!(report.changes.old, vec!["SDA was perhaps installed"]);
    assert_eq!(diagnostics.ping_calls.load(Ordering::SeqCst), 0);
    assert_eq!(diagnostics.deploy_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sda_dry_run() {
    let diagnostics = Arc::new(MockDiagnostics::default());

    let report = run_sda(&diagnostics, &sda_request(), true).await;

    assert_eq!(report.result, StateResult::NoOp);
    assert_eq!(report.changes.new, vec!["SDA would be installed"]);
    assert_eq!(diagnostics.deploy_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sda_upload_failure() {
    let diagnostics = Arc::new(MockDiagnostics {
        ping: None,
        deploy_ok: false,
        ..Default::default()
    });

    let report = run_sda(&diagnostics, &sda_request(), false).await;

    assert_eq!(report.result, StateResult::Failure);
    assert_eq!(report.comment, "Could not install SDA");
    assert!(report.changes.is_empty());
}

#[tokio::test]
async fn test_sda_ping_failure_falls_through_to_install() {
    let diagnostics = Arc::new(MockDiagnostics {
        ping_fails: true,
        deploy_ok: true,
        ..Default::default()
    });

    let report = run_sda(&diagnostics, &sda_request(), false).await;

    assert_eq!(report.result, StateResult::Success);
    assert_eq!(report.comment, "Installed SDA");
    assert_eq!(report.changes.old, vec!["SDA was not installed"]);
    assert_eq!(diagnostics.ping_calls.load(Ordering::SeqCst), 1);
    assert_eq!(diagnostics.deploy_calls.load(Ordering::SeqCst), 1);
}

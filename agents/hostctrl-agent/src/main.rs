//! hostctrl Agent CLI Entry Point
//!
//! This is the main entry point for the hostctrl-agent binary, which applies the declared
//! Host Agent states.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use hostctrl_agent::agent::{Context, StateHandler};
use hostctrl_agent::cli::config::{Config, LoggingConfig, StateConfig};
use hostctrl_agent::cli::output::{RunSummary, StateRun};
use hostctrl_agent::hostagent::{self, diagnostics::SdaClient, soap::SoapAdapter};
use hostctrl_agent::ChangeReport;

type Handler = StateHandler<SoapAdapter, SdaClient>;

#[derive(Parser)]
#[command(name = "hostctrl-agent")]
#[command(author, version, about = "hostctrl agent - idempotent SAP Host Agent states")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/hostctrl/agent.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Report intended changes without applying them
    #[arg(short, long, global = true)]
    test: bool,

    /// Report output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all states declared in the configuration, in order
    Apply,
    /// Ensure that an SAP system is installed
    SystemInstalled {
        /// SAP system ID
        name: String,
    },
    /// Ensure that outside discovery is configured and executed
    OutsideDiscovery {
        /// SLD host
        name: String,
        /// SLD port
        #[arg(long)]
        sld_port: u16,
        /// SLD user
        #[arg(long)]
        sld_user: String,
        /// SLD password
        #[arg(long, env = "HOSTCTRL_SLD_PASSWORD", hide_env_values = true)]
        sld_password: String,
        /// OS user that runs sldreg, defaults to the Host Agent user
        #[arg(long)]
        username: Option<String>,
        /// Reconfigure even if the configuration matches
        #[arg(long)]
        overwrite: bool,
        /// Keep other SLD configurations
        #[arg(long)]
        keep_other_config: bool,
    },
    /// Ensure that the Simple Diagnostics Agent is installed
    SdaInstalled {
        /// SDA SAR archive
        name: PathBuf,
        /// SAPJVM SAR archive
        #[arg(long)]
        jvm_arch: PathBuf,
        /// Do not verify HTTPS certificates
        #[arg(long)]
        no_verify: bool,
        /// Install even if an SDA is already installed
        #[arg(long)]
        overwrite: bool,
    },
    /// Show Host Agent installation and connectivity
    Status,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_or_default(&cli.config)?;
    init_logging(&config.logging, cli.verbose)?;

    let states = match cli.command {
        Commands::Apply => config.states.clone(),
        Commands::SystemInstalled { name } => vec![StateConfig::SystemInstalled {
            name,
            username: None,
            password: None,
        }],
        Commands::OutsideDiscovery {
            name,
            sld_port,
            sld_user,
            sld_password,
            username,
            overwrite,
            keep_other_config,
        } => vec![StateConfig::OutsideDiscoveryExecuted {
            name,
            sld_port,
            sld_user,
            sld_password,
            username,
            password: None,
            overwrite,
            keep_other_config,
        }],
        Commands::SdaInstalled {
            name,
            jvm_arch,
            no_verify,
            overwrite,
        } => vec![StateConfig::SdaInstalled {
            name,
            jvm_arch,
            username: None,
            password: None,
            verify: !no_verify,
            overwrite,
        }],
        Commands::Status => return show_status(&config).await,
        Commands::Version => {
            show_version();
            return Ok(());
        }
    };

    let summary = apply(&config, states, cli.test).await;
    match cli.output {
        OutputFormat::Text => print!("{}", summary),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize reports")?
        ),
    }

    if summary.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level: {}", level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = match logging.format.as_str() {
        "json" => builder.json().with_current_span(true).try_init(),
        "compact" => builder.compact().try_init(),
        _ => builder.pretty().try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

async fn apply(config: &Config, states: Vec<StateConfig>, test: bool) -> RunSummary {
    let run_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("apply", run_id = %run_id, test);

    async {
        info!(states = states.len(), "Applying states");
        if !hostagent::is_installed(&config.host_agent.install_dir) {
            warn!(
                install_dir = %config.host_agent.install_dir.display(),
                "SAP Host Agent does not seem to be installed"
            );
        }

        let mut runs = Vec::with_capacity(states.len());
        for state in &states {
            let report = match build_handler(config, state, test) {
                Ok(handler) => run_state(&handler, config, state).await,
                Err(e) => ChangeReport::new(state.name()).fail(format!("{:#}", e)),
            };
            runs.push(StateRun {
                function: state.kind().to_string(),
                report,
            });
        }

        RunSummary {
            run_id: run_id.clone(),
            test,
            states: runs,
        }
    }
    .instrument(span)
    .await
}

fn build_handler(config: &Config, state: &StateConfig, test: bool) -> Result<Handler> {
    let host_agent = &config.host_agent;
    let (username, password) = state.credential_overrides();
    let credentials = host_agent.credentials(username, password)?;

    let agent = SoapAdapter::new(host_agent.connection_options(), credentials.clone());
    let diagnostics = SdaClient::new(host_agent.diagnostics_options(state.verify()), credentials)
        .context("Failed to set up the diagnostics agent client")?;
    let ctx = Context::new()
        .with_test(test)
        .with_install_dir(&host_agent.install_dir);

    Ok(StateHandler::new(Arc::new(agent), Arc::new(diagnostics), ctx))
}

async fn run_state(handler: &Handler, config: &Config, state: &StateConfig) -> ChangeReport {
    info!(kind = state.kind(), name = %state.name(), "Running state");
    match state {
        StateConfig::SystemInstalled { name, .. } => handler.system_installed(name).await,
        StateConfig::OutsideDiscoveryExecuted { .. } => {
            let (username, _) = state.credential_overrides();
            let default_user = username.unwrap_or(&config.host_agent.username);
            match state.discovery_request(default_user) {
                Some(request) => handler.outside_discovery_executed(&request).await,
                None => ChangeReport::new(state.name()).fail("Invalid outside discovery state"),
            }
        }
        StateConfig::SdaInstalled { .. } => match state.sda_request() {
            Some(request) => handler.sda_installed(&request).await,
            None => ChangeReport::new(state.name()).fail("Invalid SDA state"),
        },
    }
}

async fn show_status(config: &Config) -> Result<()> {
    let host_agent = &config.host_agent;
    println!("Host Agent Status: checking...");

    let install_dir = &host_agent.install_dir;
    if hostagent::is_installed(install_dir) {
        println!("  Installation: {} (installed)", install_dir.display());
    } else {
        println!("  Installation: {} (not installed)", install_dir.display());
    }

    match host_agent.credentials(None, None) {
        Ok(credentials) => {
            let adapter = SoapAdapter::new(host_agent.connection_options(), credentials);
            match adapter.connect().await {
                Ok(session) => println!(
                    "  SAPHostControl: {} ({})",
                    session.endpoint(),
                    session.scheme()
                ),
                Err(e) => println!("  SAPHostControl: not available - {}", e),
            }
        }
        Err(e) => println!("  SAPHostControl: not checked - {}", e),
    }
    Ok(())
}

fn show_version() {
    println!("hostctrl-agent {}", env!("CARGO_PKG_VERSION"));
    println!("Idempotent states for the SAP Host Agent");
    println!();
    println!("States:");
    println!("  - system_installed");
    println!("  - outside_discovery_executed");
    println!("  - sda_installed");
}

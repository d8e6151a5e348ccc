use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hostctrl_agent::hostagent::adapter::DatabaseRef;
use hostctrl_agent::SldDestination;

mod client;
mod commands;
mod config;

use client::ConnectArgs;

#[derive(Parser)]
#[command(name = "hostctrl", about = "hostctrl CLI - Run SAP Host Agent operations")]
#[command(version, propagate_version = true)]
struct Cli {
    /// Host Agent FQDN (default: saved profile, then the local host name)
    #[arg(long, global = true)]
    fqdn: Option<String>,

    /// Host Agent user (default: saved profile, then sapadm)
    #[arg(short, long, global = true)]
    username: Option<String>,

    /// Host Agent password, prompted for if not given
    #[arg(long, env = "HOSTCTRL_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the connection to a Host Agent and save it as the default profile
    Login {
        /// Never fall back to plain HTTP
        #[arg(long)]
        no_fallback: bool,
    },

    /// List installed SAP systems
    Systems,

    /// List the instances of an SAP system
    Instances {
        /// SAP system ID
        sid: String,
    },

    /// List database systems
    Databases,

    /// Show, start or stop a database
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// Configure or execute outside discovery
    Discovery {
        #[command(subcommand)]
        command: DiscoveryCommands,
    },
}

#[derive(Args)]
struct DatabaseArgs {
    /// Database name, e.g. HAN
    name: String,

    /// Database type, e.g. hdb, ada, db6
    #[arg(short = 't', long = "type")]
    db_type: String,
}

impl From<DatabaseArgs> for DatabaseRef {
    fn from(args: DatabaseArgs) -> Self {
        DatabaseRef::new(args.name, args.db_type)
    }
}

#[derive(Subcommand)]
enum DbCommands {
    /// Show the database status
    Status(DatabaseArgs),
    /// Start the database
    Start(DatabaseArgs),
    /// Stop the database
    Stop(DatabaseArgs),
}

#[derive(Subcommand)]
enum DiscoveryCommands {
    /// Register the Host Agent at an SLD / LMDB
    Configure {
        /// SLD host
        host: String,

        /// SLD HTTPS port
        #[arg(short, long)]
        port: u16,

        /// SLD user
        #[arg(long)]
        sld_user: String,

        /// SLD password
        #[arg(long, env = "HOSTCTRL_SLD_PASSWORD", hide_env_values = true)]
        sld_password: String,
    },
    /// Execute the outside discovery
    Execute,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let args = ConnectArgs {
        fqdn: cli.fqdn,
        username: cli.username,
        password: cli.password,
    };

    match cli.command {
        Commands::Login { no_fallback } => {
            commands::login::run(args.fqdn, args.username, args.password, no_fallback).await
        }
        Commands::Systems => commands::systems::list(args, cli.json).await,
        Commands::Instances { sid } => commands::instances::list(args, &sid, cli.json).await,
        Commands::Databases => commands::databases::list(args, cli.json).await,
        Commands::Db { command } => match command {
            DbCommands::Status(db) => commands::database::status(args, db.into()).await,
            DbCommands::Start(db) => commands::database::start(args, db.into()).await,
            DbCommands::Stop(db) => commands::database::stop(args, db.into()).await,
        },
        Commands::Discovery { command } => match command {
            DiscoveryCommands::Configure {
                host,
                port,
                sld_user,
                sld_password,
            } => {
                let destination = SldDestination {
                    host,
                    port,
                    username: sld_user,
                    password: sld_password,
                };
                commands::discovery::configure(args, destination).await
            }
            DiscoveryCommands::Execute => commands::discovery::execute(args).await,
        },
    }
}

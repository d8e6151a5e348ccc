use anyhow::{bail, Result};
use colored::Colorize;

use hostctrl_agent::hostagent::adapter::DatabaseRef;
use hostctrl_agent::HostAgent;

use crate::client::{self, ConnectArgs};

/// Show the status of a database
pub async fn status(args: ConnectArgs, database: DatabaseRef) -> Result<()> {
    let agent = client::adapter(args)?;

    let status = agent.get_database_status(&database).await?;
    let status = status.unwrap_or_else(|| "none".to_string());

    let colored = if status.ends_with("RUNNING") {
        status.green()
    } else if status.ends_with("STOPPED") {
        status.red()
    } else {
        status.yellow()
    };
    println!("  {} ({}): {}", database.name.bold(), database.db_type, colored);

    Ok(())
}

/// Start a database
pub async fn start(args: ConnectArgs, database: DatabaseRef) -> Result<()> {
    let agent = client::adapter(args)?;

    let spinner = client::spinner(format!("Starting database {}", database.name))?;
    let started = agent.start_database(&database).await;

    match started {
        Ok(true) => {
            spinner.finish_with_message(format!(
                "{} Database {} started",
                "✓".green().bold(),
                database.name
            ));
            Ok(())
        }
        Ok(false) => {
            spinner.finish_with_message(format!("{} Database {} did not start", "✗".red().bold(), database.name));
            bail!("StartDatabase was not successfully executed")
        }
        Err(e) => {
            spinner.finish_and_clear();
            Err(e.into())
        }
    }
}

/// Stop a database
pub async fn stop(args: ConnectArgs, database: DatabaseRef) -> Result<()> {
    let agent = client::adapter(args)?;

    let spinner = client::spinner(format!("Stopping database {}", database.name))?;
    let stopped = agent.stop_database(&database).await;

    match stopped {
        Ok(true) => {
            spinner.finish_with_message(format!(
                "{} Database {} stopped",
                "✓".green().bold(),
                database.name
            ));
            Ok(())
        }
        Ok(false) => {
            spinner.finish_with_message(format!("{} Database {} did not stop", "✗".red().bold(), database.name));
            bail!("StopDatabase was not successfully executed")
        }
        Err(e) => {
            spinner.finish_and_clear();
            Err(e.into())
        }
    }
}

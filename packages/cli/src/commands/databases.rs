use anyhow::Result;
use colored::Colorize;

use hostctrl_agent::HostAgent;

use crate::client::{self, ConnectArgs};

/// List database systems
pub async fn list(args: ConnectArgs, json: bool) -> Result<()> {
    let agent = client::adapter(args)?;
    let databases = agent.list_database_systems().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&databases)?);
        return Ok(());
    }

    if databases.is_empty() {
        println!("{}", "No databases found.".dimmed());
        return Ok(());
    }

    println!("{}", "Databases".bold());
    println!("{}", "─".repeat(60));

    for db in &databases {
        println!(
            "  {} {}",
            db.name.bold(),
            format!("({})", db.db_type.as_deref().unwrap_or("-")).dimmed()
        );
        if let Some(version) = &db.version {
            println!("    Version: {}", version);
        }
        if let Some(connect) = &db.connect_string {
            println!("    Connect: {}", connect.dimmed());
        }
        for instance in &db.instances {
            println!(
                "    Instance: {} on {}",
                instance.name.as_deref().unwrap_or("-"),
                instance.host.as_deref().unwrap_or("-")
            );
        }
        println!();
    }

    println!("{} database(s)", databases.len());

    Ok(())
}

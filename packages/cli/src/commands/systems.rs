use anyhow::Result;
use colored::Colorize;

use hostctrl_agent::HostAgent;

use crate::client::{self, ConnectArgs};

/// List installed SAP systems
pub async fn list(args: ConnectArgs, json: bool) -> Result<()> {
    let agent = client::adapter(args)?;
    let systems = agent.list_systems().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&systems)?);
        return Ok(());
    }

    if systems.is_empty() {
        println!("{}", "No SAP systems found.".dimmed());
        return Ok(());
    }

    println!("{}", format!("SAP systems on {}", agent.fqdn()).bold());
    println!("{}", "─".repeat(40));
    for sid in &systems {
        println!("  {}", sid.bold());
    }
    println!();
    println!("{} system(s)", systems.len());

    Ok(())
}

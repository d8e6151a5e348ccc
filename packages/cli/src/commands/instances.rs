use anyhow::Result;
use colored::Colorize;

use hostctrl_agent::HostAgent;

use crate::client::{self, ConnectArgs};

/// List the instances of an SAP system
pub async fn list(args: ConnectArgs, sid: &str, json: bool) -> Result<()> {
    let agent = client::adapter(args)?;
    let instances = agent.list_instances(sid).await?;

    if json {
        let map: serde_json::Map<String, serde_json::Value> = instances
            .iter()
            .map(|i| (i.hostname.clone(), serde_json::Value::from(i.system_number.clone())))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    if instances.is_empty() {
        println!("{}", format!("No instances of {} found.", sid).dimmed());
        return Ok(());
    }

    println!("{}", format!("Instances of {}", sid).bold());
    println!("{}", "─".repeat(40));
    println!("  {:<28} {:>8}", "HOSTNAME".dimmed(), "NR".dimmed());
    for instance in &instances {
        println!("  {:<28} {:>8}", instance.hostname, instance.system_number);
    }
    println!();
    println!("{} instance(s)", instances.len());

    Ok(())
}

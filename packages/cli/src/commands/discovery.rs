use anyhow::{bail, Result};
use colored::Colorize;

use hostctrl_agent::{HostAgent, SldDestination};

use crate::client::{self, ConnectArgs};

/// Register the Host Agent at an SLD / LMDB
pub async fn configure(args: ConnectArgs, destination: SldDestination) -> Result<()> {
    let agent = client::adapter(args)?;

    println!(
        "{} Configuring outside discovery to {}:{}",
        "→".blue().bold(),
        destination.host,
        destination.port
    );

    if !agent.configure_outside_discovery(&destination).await? {
        bail!("Cannot configure SAP Host Agent to use outside discovery");
    }

    println!("{} Outside discovery is configured", "✓".green().bold());
    Ok(())
}

/// Run the outside discovery
pub async fn execute(args: ConnectArgs) -> Result<()> {
    let agent = client::adapter(args)?;

    let spinner = client::spinner("Executing outside discovery")?;
    let executed = agent.execute_outside_discovery().await;
    spinner.finish_and_clear();

    if !executed? {
        bail!("Outside discovery execution failed");
    }

    println!("{} Outside discovery was executed successfully", "✓".green().bold());
    Ok(())
}

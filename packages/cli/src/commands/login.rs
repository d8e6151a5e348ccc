use anyhow::{Context, Result};
use colored::Colorize;

use hostctrl_agent::{Credentials, SoapAdapter};

use crate::client;
use crate::config::Config;

/// Handle the login command
pub async fn run(
    fqdn: Option<String>,
    username: Option<String>,
    password: Option<String>,
    no_fallback: bool,
) -> Result<()> {
    println!("{}", "hostctrl Login".bold());
    println!();

    let mut config = Config::load().unwrap_or_default();

    if let Some(fqdn) = fqdn {
        config.fqdn = Some(fqdn);
    }
    if let Some(username) = username {
        config.username = Some(username);
    }
    if no_fallback {
        config.fallback = Some(false);
    }

    let username = config.username().to_string();
    let password = client::password(password, &username)?;

    // Verify the credentials by retrieving the service description
    let adapter = SoapAdapter::new(
        config.connection_options(None),
        Credentials::new(&username, password),
    );
    let session = adapter
        .connect()
        .await
        .with_context(|| format!("Cannot reach the Host Agent on {}", config.fqdn()))?;

    config.save()?;

    println!();
    println!(
        "{} Connected to {} as {} ({})",
        "✓".green().bold(),
        session.endpoint(),
        username,
        session.scheme()
    );
    println!(
        "  Config saved to {}",
        Config::path()?.display().to_string().dimmed()
    );

    Ok(())
}

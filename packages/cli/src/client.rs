//! Host Agent Client
//!
//! Builds a SOAP adapter for the Host Agent from the saved profile and the command line.

use anyhow::{bail, Result};
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::debug;

use hostctrl_agent::{Credentials, SoapAdapter};

use crate::config::Config;

/// Connection settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConnectArgs {
    pub fqdn: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Read the password from the arguments or prompt for it
pub fn password(given: Option<String>, username: &str) -> Result<String> {
    if let Some(password) = given.filter(|p| !p.is_empty()) {
        return Ok(password);
    }

    let password: String = Password::new()
        .with_prompt(format!("Password for {}", username))
        .interact()?;

    if password.is_empty() {
        bail!("Password cannot be empty");
    }
    Ok(password)
}

/// Create an adapter from the saved profile, overridden by `args`
pub fn adapter(args: ConnectArgs) -> Result<SoapAdapter> {
    let config = Config::load()?;
    let username = args
        .username
        .unwrap_or_else(|| config.username().to_string());
    let password = password(args.password, &username)?;
    let options = config.connection_options(args.fqdn.as_deref());
    debug!(
        fqdn = %options.fqdn,
        username = %username,
        fallback = options.fallback,
        "Using Host Agent connection"
    );

    Ok(SoapAdapter::new(options, Credentials::new(username, password)))
}

/// Spinner for long-running Host Agent calls
pub fn spinner(message: impl Into<String>) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.blue} {msg}")?,
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

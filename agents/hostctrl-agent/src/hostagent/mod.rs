//! Host Agent module
//!
//! This module provides access to the SAP Host Agent through a common HostAgent trait, the
//! SOAP implementation of that trait, and the diagnostics agent client.

pub mod adapter;
pub mod diagnostics;
pub mod error;
pub mod soap;

use std::path::Path;

/// Default installation directory of the SAP Host Agent
pub const DEFAULT_INSTALL_DIR: &str = "/usr/sap/hostctrl";

/// Whether the Host Agent is installed below `install_dir`
pub fn is_installed(install_dir: &Path) -> bool {
    install_dir.join("exe").is_dir()
}

//! Execution context shared by all states of a run

use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::runner::{CommandRunner, ProcessRunner};
use crate::hostagent::DEFAULT_INSTALL_DIR;

/// Ambient settings of a state run
#[derive(Clone)]
pub struct Context {
    /// Dry-run: report intended changes without applying them
    pub test: bool,
    /// Host Agent installation directory
    pub install_dir: PathBuf,
    pub runner: Arc<dyn CommandRunner>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            test: false,
            install_dir: PathBuf::from(DEFAULT_INSTALL_DIR),
            runner: Arc::new(ProcessRunner::new()),
        }
    }

    pub fn with_test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    pub fn with_install_dir(mut self, install_dir: impl Into<PathBuf>) -> Self {
        self.install_dir = install_dir.into();
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// `{install_dir}/exe`
    pub fn exe_dir(&self) -> PathBuf {
        self.install_dir.join("exe")
    }

    /// `{install_dir}/exe/config.d`
    pub fn config_dir(&self) -> PathBuf {
        self.exe_dir().join("config.d")
    }

    /// `{install_dir}/work/outsidediscovery.log`
    pub fn discovery_log(&self) -> PathBuf {
        self.install_dir.join("work").join("outsidediscovery.log")
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("test", &self.test)
            .field("install_dir", &self.install_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let ctx = Context::new().with_install_dir("/opt/hostctrl");
        assert!(!ctx.test);
        assert_eq!(ctx.config_dir(), PathBuf::from("/opt/hostctrl/exe/config.d"));
        assert_eq!(
            ctx.discovery_log(),
            PathBuf::from("/opt/hostctrl/work/outsidediscovery.log")
        );
    }
}

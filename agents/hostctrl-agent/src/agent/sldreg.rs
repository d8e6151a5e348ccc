//! sldreg helpers
//!
//! Parses the output of `sldreg -showconnect` and the return codes written to the outside
//! discovery log.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::hostagent::adapter::SldDestination;

/// Parameters read from `sldreg -showconnect`
const SHOWCONNECT_PARAMS: [&str; 4] = ["host_param", "https_param", "port_param", "user_param"];

fn return_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Return code: ([0-9]{3})").expect("valid return code regex"))
}

/// Connection parameters of an existing SLD destination file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShowConnect {
    params: HashMap<String, String>,
}

impl ShowConnect {
    /// Parse `sldreg -showconnect` output
    ///
    /// A line may carry a parameter anywhere; the text from the parameter name onward is split
    /// at the first `=` and the value is stripped of surrounding single quotes.
    pub fn parse(stdout: &str) -> Self {
        let mut params = HashMap::new();
        for line in stdout.lines() {
            for param in SHOWCONNECT_PARAMS {
                let Some(offset) = line.find(param) else {
                    continue;
                };
                match line[offset..].split_once('=') {
                    Some((key, value)) => {
                        params.insert(key.to_string(), value.trim_matches('\'').to_string());
                    }
                    None => tracing::debug!(line, param, "Skipping parameter without value"),
                }
            }
        }
        tracing::debug!(?params, "Parsed existing SLD configuration");
        Self { params }
    }

    pub fn get(&self, param: &str) -> Option<&str> {
        self.params.get(param).map(String::as_str)
    }

    /// Whether the configuration points to `destination` over HTTPS
    pub fn matches(&self, destination: &SldDestination) -> bool {
        self.get("user_param") == Some(destination.username.as_str())
            && self.get("host_param") == Some(destination.host.as_str())
            && self.get("port_param") == Some(destination.port.to_string().as_str())
            && self.get("https_param") == Some("y")
    }
}

/// The last `Return code: NNN` in an outside discovery log
pub fn last_return_code(log: &str) -> Option<u16> {
    return_code_regex()
        .captures_iter(log)
        .last()
        .and_then(|caps| caps[1].parse().ok())
}

/// Whether the last logged outside discovery run returned 200
pub fn discovery_succeeded(log: &str) -> bool {
    let code = last_return_code(log);
    tracing::debug!(return_code = ?code, "Last outside discovery return code");
    code == Some(200)
}

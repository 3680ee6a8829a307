//! Description of the host the server runs on, used to tailor prompts.
//!
//! Detected once per process; the host does not change while we run.

use std::fmt;
use std::process::Command;
use std::sync::OnceLock;
use tracing::debug;
use which::which;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    pub os_name: String,
    pub version: String,
    pub machine: String,
}

impl fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.os_name, self.version, self.machine)
    }
}

/// The cached description of this host.
pub fn current() -> &'static SystemInfo {
    static INFO: OnceLock<SystemInfo> = OnceLock::new();
    INFO.get_or_init(|| {
        let info = detect();
        debug!("Detected system: {}", info);
        info
    })
}

fn detect() -> SystemInfo {
    let machine = std::env::consts::ARCH.to_string();

    match std::env::consts::OS {
        "macos" => SystemInfo {
            os_name: "macOS".to_string(),
            version: command_output("sw_vers", &["-productVersion"])
                .unwrap_or_else(|| "Unknown version".to_string()),
            machine,
        },
        "linux" => SystemInfo {
            os_name: "Linux".to_string(),
            version: linux_distribution(),
            machine,
        },
        other => SystemInfo {
            os_name: capitalize(other),
            version: "Unknown version".to_string(),
            machine,
        },
    }
}

fn linux_distribution() -> String {
    command_output("lsb_release", &["-ds"])
        .or_else(|| {
            std::fs::read_to_string("/etc/os-release")
                .ok()
                .and_then(|content| pretty_name_from_os_release(&content))
        })
        .unwrap_or_else(|| "Unknown distribution".to_string())
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    which(program).ok()?;
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().trim_matches('"').to_string();
    (!text.is_empty()).then_some(text)
}

/// Extract `PRETTY_NAME` from the contents of `/etc/os-release`.
pub fn pretty_name_from_os_release(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|value| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

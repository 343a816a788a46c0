//! System collaborators
//!
//! Everything the cleaner needs from the operating system beyond plain file
//! IO: elevation, running processes, service control, ownership, and the
//! component store maintenance tool. The `SystemOps` trait is the seam; the
//! host implementation shells out to the usual Windows tools.

use crate::error::SystemError;
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Whether this process runs with administrator rights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Elevation {
    Elevated,
    NotElevated,
}

impl Elevation {
    pub fn is_elevated(self) -> bool {
        self == Elevation::Elevated
    }
}

impl From<bool> for Elevation {
    fn from(elevated: bool) -> Self {
        if elevated {
            Elevation::Elevated
        } else {
            Elevation::NotElevated
        }
    }
}

/// Result of a successful service start/stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceChange {
    /// The service changed state
    Changed,
    /// The service was already stopped (or started)
    AlreadyInState,
}

/// Output of a component store analysis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComponentStoreAnalysis {
    /// "Actual Size of Component Store" as printed by the tool
    pub actual_size: Option<String>,
    pub reclaimable_packages: Option<String>,
    pub cleanup_recommended: Option<bool>,
}

pub trait SystemOps {
    fn is_elevated(&self) -> bool;

    /// The subset of `names` that currently has a running process, in input order.
    fn running_processes_among(&self, names: &[String]) -> Vec<String>;

    fn stop_service(&self, name: &str) -> Result<ServiceChange, SystemError>;

    fn start_service(&self, name: &str) -> Result<ServiceChange, SystemError>;

    fn take_ownership(&self, path: &Path) -> Result<(), SystemError>;

    /// Terminate every process with this image name. Nothing running is not an error.
    fn terminate_process(&self, name: &str) -> Result<(), SystemError>;

    fn launch_process(&self, name: &str) -> Result<(), SystemError>;

    fn compact_component_store(&self, aggressive: bool, timeout: Duration) -> Result<(), SystemError>;

    fn analyze_component_store(&self, timeout: Duration) -> Result<ComponentStoreAnalysis, SystemError>;
}

/// The real machine
#[derive(Debug, Default, Clone, Copy)]
pub struct HostSystem;

impl HostSystem {
    pub fn elevation(&self) -> Elevation {
        Elevation::from(self.is_elevated())
    }
}

impl SystemOps for HostSystem {
    #[cfg(windows)]
    fn is_elevated(&self) -> bool {
        // `net session` only succeeds for administrators
        Command::new("net")
            .arg("session")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    #[cfg(not(windows))]
    fn is_elevated(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    fn running_processes_among(&self, names: &[String]) -> Vec<String> {
        if names.is_empty() {
            return Vec::new();
        }

        let mut system = sysinfo::System::new();
        system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);

        let running: Vec<String> = system
            .processes()
            .values()
            .map(|proc| proc.name().to_string_lossy().to_lowercase())
            .collect();

        names
            .iter()
            .filter(|name| running.iter().any(|r| *r == name.to_lowercase()))
            .cloned()
            .collect()
    }

    fn stop_service(&self, name: &str) -> Result<ServiceChange, SystemError> {
        service_command("stop", name, &["not started", "nicht gestartet", "3521"])
    }

    fn start_service(&self, name: &str) -> Result<ServiceChange, SystemError> {
        service_command("start", name, &["already been started", "bereits gestartet", "2182"])
    }

    #[cfg(windows)]
    fn take_ownership(&self, path: &Path) -> Result<(), SystemError> {
        let path_str = path.to_string_lossy();
        let takeown = run_command(
            Command::new("takeown").args(["/F", &*path_str, "/R", "/A", "/D", "Y"]),
            "takeown",
        )?;
        // S-1-5-32-544 is BUILTIN\Administrators on every UI language
        let icacls = run_command(
            Command::new("icacls").args([&*path_str, "/T", "/grant", "*S-1-5-32-544:F", "/C"]),
            "icacls",
        )?;

        let mut failures = Vec::new();
        if !takeown.status.success() {
            failures.push(format!("takeown: {}", failure_text(&takeown)));
        }
        if !icacls.status.success() {
            failures.push(format!("icacls: {}", failure_text(&icacls)));
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(SystemError::CommandFailed {
                command: "takeown/icacls".to_string(),
                details: failures.join(" | "),
            })
        }
    }

    #[cfg(not(windows))]
    fn take_ownership(&self, _path: &Path) -> Result<(), SystemError> {
        Err(SystemError::Unsupported {
            operation: "taking ownership",
        })
    }

    fn terminate_process(&self, name: &str) -> Result<(), SystemError> {
        let mut system = sysinfo::System::new();
        system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);

        let wanted = name.to_lowercase();
        let mut failed = 0usize;
        for proc in system.processes().values() {
            if proc.name().to_string_lossy().to_lowercase() == wanted && !proc.kill() {
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(SystemError::CommandFailed {
                command: format!("terminate {name}"),
                details: format!("{failed} process(es) could not be terminated"),
            });
        }

        // Give the process time to release its file handles
        thread::sleep(Duration::from_secs(1));
        Ok(())
    }

    fn launch_process(&self, name: &str) -> Result<(), SystemError> {
        Command::new(name)
            .spawn()
            .map_err(|source| SystemError::Spawn {
                command: name.to_string(),
                source,
            })?;
        thread::sleep(Duration::from_secs(1));
        Ok(())
    }

    #[cfg(windows)]
    fn compact_component_store(&self, aggressive: bool, timeout: Duration) -> Result<(), SystemError> {
        let mut cmd = Command::new("Dism.exe");
        cmd.args(["/online", "/Cleanup-Image", "/StartComponentCleanup"]);
        if aggressive {
            cmd.arg("/ResetBase");
        }
        let output = run_with_timeout(&mut cmd, "Dism.exe /StartComponentCleanup", timeout)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SystemError::CommandFailed {
                command: "Dism.exe /StartComponentCleanup".to_string(),
                details: failure_text(&output),
            })
        }
    }

    #[cfg(not(windows))]
    fn compact_component_store(&self, _aggressive: bool, _timeout: Duration) -> Result<(), SystemError> {
        Err(SystemError::Unsupported {
            operation: "component store cleanup",
        })
    }

    #[cfg(windows)]
    fn analyze_component_store(&self, timeout: Duration) -> Result<ComponentStoreAnalysis, SystemError> {
        let mut cmd = Command::new("Dism.exe");
        cmd.args(["/online", "/Cleanup-Image", "/AnalyzeComponentStore"]);
        let output = run_with_timeout(&mut cmd, "Dism.exe /AnalyzeComponentStore", timeout)?;
        if !output.status.success() {
            return Err(SystemError::CommandFailed {
                command: "Dism.exe /AnalyzeComponentStore".to_string(),
                details: failure_text(&output),
            });
        }
        Ok(parse_component_store_analysis(&String::from_utf8_lossy(&output.stdout)))
    }

    #[cfg(not(windows))]
    fn analyze_component_store(&self, _timeout: Duration) -> Result<ComponentStoreAnalysis, SystemError> {
        Err(SystemError::Unsupported {
            operation: "component store analysis",
        })
    }
}

#[cfg(windows)]
fn service_command(verb: &str, name: &str, already_markers: &[&str]) -> Result<ServiceChange, SystemError> {
    let command = format!("net {verb} {name}");
    let output = run_command(Command::new("net").args([verb, name]), &command)?;
    if output.status.success() {
        return Ok(ServiceChange::Changed);
    }

    let text = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
    .to_lowercase();
    if already_markers.iter().any(|marker| text.contains(marker)) {
        return Ok(ServiceChange::AlreadyInState);
    }

    Err(SystemError::CommandFailed {
        command,
        details: failure_text(&output),
    })
}

#[cfg(not(windows))]
fn service_command(_verb: &str, _name: &str, _already_markers: &[&str]) -> Result<ServiceChange, SystemError> {
    Err(SystemError::Unsupported {
        operation: "service control",
    })
}

#[cfg_attr(not(windows), allow(dead_code))]
fn run_command(cmd: &mut Command, label: &str) -> Result<Output, SystemError> {
    cmd.output().map_err(|source| SystemError::Spawn {
        command: label.to_string(),
        source,
    })
}

/// Run `cmd` to completion or kill it once `timeout` has passed.
///
/// Output is drained on background threads so a chatty child cannot block
/// on a full pipe while we wait.
pub fn run_with_timeout(cmd: &mut Command, label: &str, timeout: Duration) -> Result<Output, SystemError> {
    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| SystemError::Spawn {
            command: label.to_string(),
            source,
        })?;

    let stdout_reader = child.stdout.take().map(drain);
    let stderr_reader = child.stderr.take().map(drain);

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            tracing::error!("{} exceeded {}s and was killed", label, timeout.as_secs());
            return Err(SystemError::Timeout {
                command: label.to_string(),
                secs: timeout.as_secs(),
            });
        }
        Err(source) => {
            let _ = child.kill();
            return Err(SystemError::Spawn {
                command: label.to_string(),
                source,
            });
        }
    };

    let collect = |reader: Option<thread::JoinHandle<Vec<u8>>>| {
        reader.and_then(|handle| handle.join().ok()).unwrap_or_default()
    };

    Ok(Output {
        status,
        stdout: collect(stdout_reader),
        stderr: collect(stderr_reader),
    })
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

#[cfg_attr(not(windows), allow(dead_code))]
fn failure_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
        return stdout;
    }
    format!("exit status {}", output.status)
}

/// Pull the interesting lines out of `/AnalyzeComponentStore` output.
/// English and German labels are recognized.
pub fn parse_component_store_analysis(output: &str) -> ComponentStoreAnalysis {
    let mut analysis = ComponentStoreAnalysis::default();

    for line in output.lines() {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let label = label.trim();
        let value = value.trim();

        if label.contains("Actual Size of Component Store")
            || label.contains("Tatsächliche Größe des Komponentenspeichers")
        {
            analysis.actual_size = Some(value.to_string());
        } else if label.contains("Number of Reclaimable Packages")
            || label.contains("Anzahl der freigabefähigen Pakete")
        {
            analysis.reclaimable_packages = Some(value.to_string());
        } else if label.contains("Component Store Cleanup Recommended")
            || label.contains("Bereinigung des Komponentenspeichers empfohlen")
        {
            let lowered = value.to_lowercase();
            analysis.cleanup_recommended = Some(lowered.starts_with("yes") || lowered.starts_with("ja"));
        }
    }

    analysis
}

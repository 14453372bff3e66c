use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ImportError;
use crate::exec::run_with_timeout;

const NETWORK_MOUNT_PREFIXES: &[&str] = &["/mnt/", "/media/", "/net/"];
const NETWORK_FS_TYPE_PREFIXES: &[&str] = &["nfs", "cifs", "smb", "fuse"];
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);
const LIVENESS_POLL: Duration = Duration::from_millis(100);
const KILL_SETTLE: Duration = Duration::from_secs(1);

pub const CATALOG_PROCESS_NAME: &str = "calibre";
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEnvironment {
    pub library_path: PathBuf,
    pub network_backed: bool,
}

impl LibraryEnvironment {
    pub fn detect(library_path: &Path) -> Self {
        let mut environment = Self::local(library_path);
        environment.network_backed = is_network_backed(library_path);
        if environment.network_backed {
            info!(library = %library_path.display(), "library is on network storage");
        }
        environment
    }

    pub fn local(library_path: &Path) -> Self {
        Self {
            library_path: library_path.to_path_buf(),
            network_backed: false,
        }
    }
}

pub fn is_network_backed(path: &Path) -> bool {
    match probe_network_backing(path) {
        Ok(network_backed) => network_backed,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "treating library as local");
            false
        }
    }
}

pub fn probe_network_backing(path: &Path) -> Result<bool, ImportError> {
    let text = path.to_string_lossy();
    if NETWORK_MOUNT_PREFIXES
        .iter()
        .any(|prefix| text.starts_with(prefix))
    {
        return Ok(true);
    }

    let mut command = Command::new("df");
    command.arg("-T").arg(path);
    let output = run_with_timeout(command, QUERY_TIMEOUT)
        .map_err(|err| ImportError::NetworkProbeInconclusive(format!("df -T: {err}")))?;

    if !output.success() {
        return Err(ImportError::NetworkProbeInconclusive(format!(
            "df -T exited with {}: {}",
            output.status,
            output.diagnostic_text()
        )));
    }

    let fs_type = filesystem_type_from_df(&output.stdout).ok_or_else(|| {
        ImportError::NetworkProbeInconclusive("df -T printed no filesystem type".to_string())
    })?;

    Ok(is_network_fs_type(&fs_type))
}

fn filesystem_type_from_df(stdout: &str) -> Option<String> {
    // Long device names wrap onto their own line, so read tokens across lines.
    stdout
        .lines()
        .skip(1)
        .flat_map(str::split_whitespace)
        .nth(1)
        .map(str::to_ascii_lowercase)
}

fn is_network_fs_type(fs_type: &str) -> bool {
    NETWORK_FS_TYPE_PREFIXES
        .iter()
        .any(|prefix| fs_type.starts_with(prefix))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

pub trait ProcessControl {
    fn find_running(&self, name_substring: &str) -> Vec<ProcessInfo>;

    fn terminate(&self, process: &ProcessInfo, grace: Duration) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcesses;

impl ProcessControl for SystemProcesses {
    fn find_running(&self, name_substring: &str) -> Vec<ProcessInfo> {
        find_running_instances(name_substring)
    }

    fn terminate(&self, process: &ProcessInfo, grace: Duration) -> bool {
        terminate(process, grace)
    }
}

#[cfg(unix)]
pub fn find_running_instances(name_substring: &str) -> Vec<ProcessInfo> {
    let mut command = Command::new("ps");
    command.arg("-A").arg("-o").arg("pid=,comm=");

    let output = match run_with_timeout(command, QUERY_TIMEOUT) {
        Ok(output) if output.success() => output,
        Ok(output) => {
            warn!(status = %output.status, stderr = %output.diagnostic_text(), "ps failed");
            return Vec::new();
        }
        Err(err) => {
            warn!(error = %err, "could not list processes");
            return Vec::new();
        }
    };

    matching_processes(&output.stdout, name_substring, std::process::id())
}

#[cfg(not(unix))]
pub fn find_running_instances(_name_substring: &str) -> Vec<ProcessInfo> {
    warn!("process enumeration is only supported on unix");
    Vec::new()
}

fn matching_processes(ps_output: &str, name_substring: &str, own_pid: u32) -> Vec<ProcessInfo> {
    let needle = name_substring.to_lowercase();

    ps_output
        .lines()
        .filter_map(|line| {
            let (pid, name) = line.trim().split_once(char::is_whitespace)?;
            let pid = pid.parse::<u32>().ok()?;
            let name = name.trim();
            (!name.is_empty()).then(|| ProcessInfo {
                pid,
                name: name.to_string(),
            })
        })
        .filter(|process| process.pid != own_pid)
        .filter(|process| process.name.to_lowercase().contains(&needle))
        .collect()
}

#[cfg(unix)]
pub fn terminate(process: &ProcessInfo, grace: Duration) -> bool {
    if !send_signal(process.pid, "-TERM") {
        return !is_alive(process.pid);
    }

    if wait_for_exit(process.pid, grace) {
        info!(pid = process.pid, name = %process.name, "process terminated");
        return true;
    }

    warn!(pid = process.pid, name = %process.name, "process ignored SIGTERM, sending SIGKILL");
    send_signal(process.pid, "-KILL");
    wait_for_exit(process.pid, KILL_SETTLE)
}

#[cfg(not(unix))]
pub fn terminate(process: &ProcessInfo, _grace: Duration) -> bool {
    warn!(pid = process.pid, "process termination is only supported on unix");
    false
}

#[cfg(unix)]
fn wait_for_exit(pid: u32, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        if !is_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(LIVENESS_POLL);
    }
}

#[cfg(unix)]
fn is_alive(pid: u32) -> bool {
    send_signal(pid, "-0")
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: &str) -> bool {
    let mut command = Command::new("kill");
    command.arg(signal).arg(pid.to_string());
    run_with_timeout(command, QUERY_TIMEOUT)
        .map(|output| output.success())
        .unwrap_or(false)
}

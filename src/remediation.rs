use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::clock::Pause;
use crate::locks::{LockClearReport, clear_stale_locks, present_lock_artifacts};
use crate::probe::{
    CATALOG_PROCESS_NAME, LibraryEnvironment, ProcessControl, ProcessInfo, TERMINATE_GRACE,
};

const LOCK_RELEASE_WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposedAction {
    TerminateInstances { processes: Vec<ProcessInfo> },
    ClearLockArtifacts { library: PathBuf, artifacts: Vec<String> },
}

impl ProposedAction {
    pub fn summary(&self) -> String {
        match self {
            Self::TerminateInstances { processes } => {
                let listed = processes
                    .iter()
                    .map(|process| format!("{} (pid {})", process.name, process.pid))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("terminate {} catalog process(es): {listed}", processes.len())
            }
            Self::ClearLockArtifacts { library, artifacts } => format!(
                "delete lock artifacts {} in {}",
                artifacts.join(", "),
                library.display()
            ),
        }
    }

    pub fn risk(&self) -> &'static str {
        match self {
            Self::TerminateInstances { .. } => {
                "unsaved work in the running catalog application will be lost"
            }
            Self::ClearLockArtifacts { .. } => {
                "if another client is still writing, its uncommitted changes may be lost"
            }
        }
    }
}

pub trait Operator {
    fn approve(&self, action: &ProposedAction) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Operator for AssumeYes {
    fn approve(&self, _action: &ProposedAction) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Decline;

impl Operator for Decline {
    fn approve(&self, action: &ProposedAction) -> bool {
        warn!(action = %action.summary(), "declined without prompting");
        false
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Prompt;

impl Operator for Prompt {
    fn approve(&self, action: &ProposedAction) -> bool {
        let stdin = io::stdin();
        let stderr = io::stderr();
        ask(action, &mut stdin.lock(), &mut stderr.lock())
    }
}

fn ask(action: &ProposedAction, input: &mut impl BufRead, output: &mut impl Write) -> bool {
    let prompt = format!(
        "Proposed: {}\nRisk: {}\nProceed? (y/N): ",
        action.summary(),
        action.risk()
    );
    if output
        .write_all(prompt.as_bytes())
        .and_then(|()| output.flush())
        .is_err()
    {
        return false;
    }

    let mut answer = String::new();
    if input.read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnlockReport {
    pub terminated: Vec<ProcessInfo>,
    pub survivors: Vec<ProcessInfo>,
    pub declined: Vec<String>,
    pub locks: LockClearReport,
}

impl UnlockReport {
    pub fn acted(&self) -> bool {
        !self.terminated.is_empty() || !self.locks.cleared.is_empty()
    }
}

pub fn resolve_lock(
    environment: &LibraryEnvironment,
    processes: &dyn ProcessControl,
    operator: &dyn Operator,
    pause: &impl Pause,
) -> UnlockReport {
    let mut report = UnlockReport::default();

    let running = processes.find_running(CATALOG_PROCESS_NAME);
    if !running.is_empty() {
        info!(count = running.len(), "found running catalog processes");
        let action = ProposedAction::TerminateInstances {
            processes: running.clone(),
        };
        if operator.approve(&action) {
            for process in running {
                if processes.terminate(&process, TERMINATE_GRACE) {
                    report.terminated.push(process);
                } else {
                    warn!(pid = process.pid, name = %process.name, "process survived termination");
                    report.survivors.push(process);
                }
            }
            if !report.terminated.is_empty() {
                pause.pause(LOCK_RELEASE_WAIT);
            }
        } else {
            warn!("catalog processes left running, lock errors may continue");
            report.declined.push(action.summary());
        }
    }

    let artifacts = present_lock_artifacts(&environment.library_path);
    if !artifacts.is_empty() {
        let action = ProposedAction::ClearLockArtifacts {
            library: environment.library_path.clone(),
            artifacts,
        };
        if operator.approve(&action) {
            report.locks = clear_stale_locks(environment, pause);
        } else {
            report.declined.push(action.summary());
        }
    }

    report
}

pub fn locked_checklist(environment: &LibraryEnvironment) -> Vec<String> {
    let library = environment.library_path.display();
    if environment.network_backed {
        vec![
            "check network connectivity to the storage hosting the library".to_string(),
            "make sure no other device or client is using the library".to_string(),
            format!("serve the library instead: calibre-server --library-path '{library}'"),
            "consider copying the library to local storage for the import".to_string(),
        ]
    } else {
        vec![
            "close the calibre application and any calibre-server".to_string(),
            format!("or run `pdf-intake unlock --library-path '{library}'` and retry"),
        ]
    }
}

pub fn instance_conflict_checklist() -> Vec<String> {
    vec!["close the running calibre application and run the import again".to_string()]
}

pub fn tool_missing_checklist(executable: &Path) -> Vec<String> {
    vec![format!(
        "no calibredb at {}; set CALIBRE_CLI_PATH or pass --calibre-cli",
        executable.display()
    )]
}

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::clock::Pause;
use crate::probe::LibraryEnvironment;

pub const LOCK_ARTIFACTS: &[&str] = &[
    "metadata.db-wal",
    "metadata.db-shm",
    "metadata_db_prefs_backup.json.lock",
    ".calibre_lock",
];

const NETWORK_DELETE_SETTLE: Duration = Duration::from_millis(500);
const NETWORK_BATCH_SETTLE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockClearFailure {
    pub artifact: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LockClearReport {
    pub cleared: Vec<String>,
    pub failed: Vec<LockClearFailure>,
}

pub fn present_lock_artifacts(library_path: &Path) -> Vec<String> {
    LOCK_ARTIFACTS
        .iter()
        .filter(|name| fs::symlink_metadata(library_path.join(name)).is_ok())
        .map(|name| name.to_string())
        .collect()
}

pub fn clear_stale_locks(environment: &LibraryEnvironment, pause: &impl Pause) -> LockClearReport {
    let mut report = LockClearReport::default();

    for name in present_lock_artifacts(&environment.library_path) {
        let path = environment.library_path.join(&name);
        match fs::remove_file(&path) {
            Ok(()) => {
                report.cleared.push(name);
                if environment.network_backed {
                    pause.pause(NETWORK_DELETE_SETTLE);
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not remove lock artifact");
                if environment.network_backed {
                    warn!(path = %path.display(), "network storage may need the artifact removed by hand");
                }
                report.failed.push(LockClearFailure {
                    artifact: name,
                    reason: err.to_string(),
                });
            }
        }
    }

    if !report.cleared.is_empty() {
        info!(
            library = %environment.library_path.display(),
            cleared = %report.cleared.join(", "),
            "cleared lock artifacts"
        );
        if environment.network_backed {
            pause.pause(NETWORK_BATCH_SETTLE);
        }
    }

    report
}

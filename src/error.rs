use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ImportError {
    #[error("catalog database still locked after {attempts} attempts")]
    DatabaseLocked { attempts: u32 },

    #[error("another catalog instance is running: {0}")]
    InstanceConflict(String),

    #[error("catalog tool not found at {}", .0.display())]
    ToolNotFound(PathBuf),

    #[error("catalog tool failed: {0}")]
    ToolError(String),

    #[error("catalog tool timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("metadata annotation failed: {0}")]
    MetadataApplyFailed(String),

    #[error("network filesystem probe inconclusive: {0}")]
    NetworkProbeInconclusive(String),
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("executable not found")]
    NotFound,

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("process i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{
    CatalogTool, ConnectionMode, FailureSignature, MetadataField, ToolOutput, add_args,
    classify_failure, list_probe_args, parse_book_id, set_metadata_args,
};
use crate::clock::Pause;
use crate::config::RetryPolicy;
use crate::error::{ExecError, ImportError};
use crate::locks::clear_stale_locks;
use crate::model::{ExtractedMetadata, ImportFailure, ImportOutcome};
use crate::probe::{LibraryEnvironment, ProcessControl};
use crate::remediation::{
    Operator, UnlockReport, instance_conflict_checklist, locked_checklist, resolve_lock,
    tool_missing_checklist,
};


pub fn backoff_delay(attempt: u32, network_backed: bool) -> Duration {
    let base = 2_u64.saturating_pow(attempt);
    let multiplier = if network_backed { 2 } else { 1 };
    Duration::from_secs(base.saturating_mul(multiplier))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AddFailure {
    Locked(String),
    Busy(String),
    TimedOut,
    Fatal(ImportFailure),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum ToolHealth {
    Ready,
    InstanceRunning(String),
    DatabaseLocked(String),
    ToolMissing,
    Failed(String),
    TimedOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub health: ToolHealth,
    pub unlock: Option<UnlockReport>,
    pub health_after_unlock: Option<ToolHealth>,
}

#[derive(Debug)]
pub struct Importer<T, P> {
    tool: T,
    pause: P,
    environment: LibraryEnvironment,
    policy: RetryPolicy,
}

impl<T: CatalogTool, P: Pause> Importer<T, P> {
    pub fn new(tool: T, pause: P, environment: LibraryEnvironment, policy: RetryPolicy) -> Self {
        Self {
            tool,
            pause,
            environment,
            policy,
        }
    }

    pub fn environment(&self) -> &LibraryEnvironment {
        &self.environment
    }

    pub fn pause(&self) -> &P {
        &self.pause
    }

    pub fn import(&self, file: &Path, metadata: &ExtractedMetadata) -> ImportOutcome {
        let (output, mode) = match self.add_with_retry(file, &metadata.title) {
            Ok(added) => added,
            Err(failure) => {
                warn!(
                    file = %file.display(),
                    reason = %failure.error,
                    "catalog import failed"
                );
                for step in &failure.remediation {
                    warn!(file = %file.display(), "try: {step}");
                }
                return ImportOutcome::Failed(failure);
            }
        };

        let Some(book_id) = parse_book_id(&output.stdout) else {
            info!(
                file = %file.display(),
                title = %metadata.title,
                "added to catalog, no book id reported so metadata was not attached"
            );
            return ImportOutcome::Imported {
                book_id: None,
                metadata_applied: false,
                metadata_error: None,
            };
        };

        match self.annotate(&book_id, metadata, mode) {
            Ok(()) => {
                info!(
                    file = %file.display(),
                    book_id = %book_id,
                    series = %metadata.series.as_deref().unwrap_or("-"),
                    published = %metadata.published_date,
                    "imported with metadata"
                );
                ImportOutcome::Imported {
                    book_id: Some(book_id),
                    metadata_applied: true,
                    metadata_error: None,
                }
            }
            Err(err) => {
                warn!(
                    file = %file.display(),
                    book_id = %book_id,
                    error = %err,
                    "added to catalog but metadata update failed"
                );
                ImportOutcome::Imported {
                    book_id: Some(book_id),
                    metadata_applied: false,
                    metadata_error: Some(err),
                }
            }
        }
    }

    fn add_with_retry(
        &self,
        file: &Path,
        title: &str,
    ) -> Result<(ToolOutput, ConnectionMode), ImportFailure> {
        let network_backed = self.environment.network_backed;
        let mut mode = ConnectionMode::Direct;
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 0;
        let mut busy_retry = false;

        loop {
            let args = add_args(file, &self.environment.library_path, mode, title);
            let failure = match self.tool.invoke(&args, self.policy.tool_timeout) {
                Ok(output) if output.success() => return Ok((output, mode)),
                Ok(output) => self.classify_add_failure(&output),
                Err(err) => self.exec_failure(err),
            };

            if busy_retry {
                let detail = match failure {
                    AddFailure::Locked(detail) | AddFailure::Busy(detail) => detail,
                    AddFailure::TimedOut => "timed out".to_string(),
                    AddFailure::Fatal(failure) => failure.error.to_string(),
                };
                return Err(ImportFailure::new(ImportError::InstanceConflict(detail))
                    .with_remediation(instance_conflict_checklist()));
            }

            match failure {
                AddFailure::Locked(detail) => {
                    if attempt + 1 >= max_attempts {
                        return Err(ImportFailure::new(ImportError::DatabaseLocked {
                            attempts: attempt + 1,
                        })
                        .with_remediation(locked_checklist(&self.environment)));
                    }

                    let delay = backoff_delay(attempt, network_backed);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        delay_secs = delay.as_secs(),
                        detail = %detail,
                        "catalog database locked, retrying"
                    );
                    if network_backed && mode == ConnectionMode::Direct {
                        info!("network library, routing next attempts through a running instance");
                        mode = ConnectionMode::ThroughRunningInstance;
                    }
                    clear_stale_locks(&self.environment, &self.pause);
                    self.pause.pause(delay);
                    attempt += 1;
                }
                AddFailure::Busy(detail) => {
                    warn!(detail = %detail, "catalog application is running, retrying through it");
                    mode = ConnectionMode::ThroughRunningInstance;
                    busy_retry = true;
                }
                AddFailure::TimedOut => {
                    if attempt + 1 >= max_attempts {
                        return Err(ImportFailure::new(ImportError::Timeout {
                            seconds: self.policy.tool_timeout.as_secs(),
                        }));
                    }

                    let delay = backoff_delay(attempt, network_backed);
                    warn!(
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs(),
                        "catalog add timed out, retrying"
                    );
                    self.pause.pause(delay);
                    attempt += 1;
                }
                AddFailure::Fatal(failure) => return Err(failure),
            }
        }
    }

    fn classify_add_failure(&self, output: &ToolOutput) -> AddFailure {
        let detail = output.diagnostic_text().to_string();
        match classify_failure(&detail) {
            FailureSignature::DatabaseLocked => AddFailure::Locked(detail),
            FailureSignature::InstanceRunning => AddFailure::Busy(detail),
            FailureSignature::Missing | FailureSignature::Unrecognized => {
                AddFailure::Fatal(ImportFailure::new(ImportError::ToolError(detail)))
            }
        }
    }

    fn exec_failure(&self, err: ExecError) -> AddFailure {
        match err {
            ExecError::TimedOut(_) => AddFailure::TimedOut,
            ExecError::NotFound => {
                let executable = self.tool.executable();
                AddFailure::Fatal(
                    ImportFailure::new(ImportError::ToolNotFound(executable.to_path_buf()))
                        .with_remediation(tool_missing_checklist(executable)),
                )
            }
            ExecError::Io(err) => AddFailure::Fatal(ImportFailure::new(ImportError::ToolError(
                format!("could not run catalog tool: {err}"),
            ))),
        }
    }

    fn annotate(
        &self,
        book_id: &str,
        metadata: &ExtractedMetadata,
        mode: ConnectionMode,
    ) -> Result<(), ImportError> {
        let mut fields = vec![MetadataField::PublishedDate(metadata.published_date)];
        if let Some(series) = &metadata.series {
            fields.push(MetadataField::Series(series.clone()));
        }

        let args = set_metadata_args(&self.environment.library_path, mode, book_id, &fields);
        match self.tool.invoke(&args, self.policy.tool_timeout) {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => Err(ImportError::MetadataApplyFailed(
                output.diagnostic_text().to_string(),
            )),
            Err(err) => Err(ImportError::MetadataApplyFailed(err.to_string())),
        }
    }

    pub fn check_health(&self) -> ToolHealth {
        let args = list_probe_args(&self.environment.library_path);
        match self.tool.invoke(&args, self.policy.probe_timeout) {
            Ok(output) if output.success() => ToolHealth::Ready,
            Ok(output) => {
                let detail = output.diagnostic_text().to_string();
                match classify_failure(&detail) {
                    FailureSignature::DatabaseLocked => ToolHealth::DatabaseLocked(detail),
                    FailureSignature::InstanceRunning => ToolHealth::InstanceRunning(detail),
                    FailureSignature::Missing => ToolHealth::ToolMissing,
                    FailureSignature::Unrecognized => ToolHealth::Failed(detail),
                }
            }
            Err(ExecError::NotFound) => ToolHealth::ToolMissing,
            Err(ExecError::TimedOut(_)) => ToolHealth::TimedOut,
            Err(ExecError::Io(err)) => ToolHealth::Failed(err.to_string()),
        }
    }

    pub fn preflight(
        &self,
        operator: &dyn Operator,
        processes: &dyn ProcessControl,
    ) -> PreflightReport {
        let health = self.check_health();
        let library = self.environment.library_path.display();

        match &health {
            ToolHealth::Ready => info!(library = %library, "catalog connection test passed"),
            ToolHealth::InstanceRunning(_) => warn!(
                library = %library,
                "calibre is running; imports will route through it when needed, closing it gives the most reliable results"
            ),
            ToolHealth::DatabaseLocked(detail) => {
                warn!(library = %library, detail = %detail, "catalog database is locked");
            }
            ToolHealth::ToolMissing => warn!(
                executable = %self.tool.executable().display(),
                "calibredb not found, check CALIBRE_CLI_PATH"
            ),
            ToolHealth::Failed(detail) => {
                warn!(library = %library, detail = %detail, "catalog connection test failed");
            }
            ToolHealth::TimedOut => warn!(library = %library, "catalog connection test timed out"),
        }

        if !matches!(health, ToolHealth::DatabaseLocked(_)) {
            return PreflightReport {
                health,
                unlock: None,
                health_after_unlock: None,
            };
        }

        let unlock = resolve_lock(&self.environment, processes, operator, &self.pause);
        let health_after_unlock = unlock.acted().then(|| self.check_health());
        match &health_after_unlock {
            Some(ToolHealth::Ready) => info!(library = %library, "catalog reachable after unlock"),
            Some(after) => warn!(
                library = %library,
                health = ?after,
                "catalog still unavailable after unlock, imports may fail"
            ),
            None => warn!(library = %library, "lock left in place, imports may fail"),
        }

        PreflightReport {
            health,
            unlock: Some(unlock),
            health_after_unlock,
        }
    }
}

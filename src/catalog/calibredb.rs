use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::debug;

use super::{CatalogTool, ToolOutput};
use crate::error::ExecError;
use crate::exec::run_with_timeout;

#[derive(Debug, Clone)]
pub struct CalibreDb {
    executable: PathBuf,
}

impl CalibreDb {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl CatalogTool for CalibreDb {
    fn executable(&self) -> &Path {
        &self.executable
    }

    fn invoke(&self, args: &[OsString], timeout: Duration) -> Result<ToolOutput, ExecError> {
        debug!(
            executable = %self.executable.display(),
            subcommand = %args.first().map(|arg| arg.to_string_lossy()).unwrap_or_default(),
            ?timeout,
            "invoking catalog tool"
        );

        let mut command = Command::new(&self.executable);
        command.args(args);
        let output = run_with_timeout(command, timeout)?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn invoke_reports_exit_code_and_streams() {
        let tool = CalibreDb::new("sh");
        let args: Vec<OsString> = vec![
            "-c".into(),
            "echo 'Added book ids: 9'; echo warn >&2; exit 0".into(),
        ];

        let output = tool
            .invoke(&args, Duration::from_secs(5))
            .expect("sh should run");
        assert!(output.success());
        assert_eq!(super::super::parse_book_id(&output.stdout).as_deref(), Some("9"));
        assert_eq!(output.stderr.trim(), "warn");
    }

    #[test]
    fn invoke_surfaces_missing_executable() {
        let tool = CalibreDb::new("/nonexistent/calibredb");
        let result = tool.invoke(&[], Duration::from_secs(1));
        assert!(matches!(result, Err(ExecError::NotFound)));
    }
}

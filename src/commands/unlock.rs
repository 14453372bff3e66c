use std::io::{self, Write};

use anyhow::{Result, bail};
use tracing::info;

use super::operator;
use crate::cli::UnlockArgs;
use crate::clock::ThreadPause;
use crate::config::LibraryConfig;
use crate::probe::{LibraryEnvironment, SystemProcesses};
use crate::remediation::{UnlockReport, resolve_lock};

pub fn run(args: UnlockArgs) -> Result<()> {
    let config = LibraryConfig::from_args(&args.library);
    if !config.library_path.is_dir() {
        bail!(
            "library directory does not exist: {}",
            config.library_path.display()
        );
    }

    let environment = LibraryEnvironment::detect(&config.library_path);
    let operator = operator(&args.confirm);
    let report = resolve_lock(&environment, &SystemProcesses, operator.as_ref(), &ThreadPause);

    if !report.acted() && report.declined.is_empty() {
        info!(library = %config.library_path.display(), "nothing to unlock");
    }

    write_text_response(&report)
}

fn write_text_response(report: &UnlockReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    for process in &report.terminated {
        writeln!(output, "terminated\t{} (pid {})", process.name, process.pid)?;
    }
    for process in &report.survivors {
        writeln!(output, "still running\t{} (pid {})", process.name, process.pid)?;
    }
    for artifact in &report.locks.cleared {
        writeln!(output, "cleared\t{artifact}")?;
    }
    for failure in &report.locks.failed {
        writeln!(output, "not cleared\t{}\t{}", failure.artifact, failure.reason)?;
    }
    for action in &report.declined {
        writeln!(output, "declined\t{action}")?;
    }

    output.flush()?;
    Ok(())
}

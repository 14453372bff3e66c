use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use super::operator;
use super::sources::collect_candidates;
use crate::catalog::CalibreDb;
use crate::cli::ImportArgs;
use crate::clock::ThreadPause;
use crate::config::RunConfig;
use crate::extract::MetadataExtractor;
use crate::importer::Importer;
use crate::model::{FileReport, RunReport, RunSummary};
use crate::pipeline::Pipeline;
use crate::probe::{LibraryEnvironment, SystemProcesses};
use crate::series_map::SeriesMap;
use crate::util::{expand_home, now_utc_string, utc_compact_string, write_json_pretty};

pub fn run(args: ImportArgs) -> Result<()> {
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(Utc::now()));

    let mut config = RunConfig::from_import_args(&args);
    for warning in config.validate() {
        warn!("{warning}");
    }

    let series_map = SeriesMap::load_or_empty(&expand_home(&args.series_map));
    let extractor = MetadataExtractor::new()?;
    let candidates = collect_candidates(&args.source)?;

    info!(
        run_id = %run_id,
        library = %config.library.library_path.display(),
        import_enabled = config.import_enabled,
        max_attempts = config.retry.max_attempts,
        files = candidates.len(),
        "import run started"
    );

    let importer = config.import_enabled.then(|| {
        Importer::new(
            CalibreDb::new(config.library.tool_path.clone()),
            ThreadPause,
            LibraryEnvironment::detect(&config.library.library_path),
            config.retry,
        )
    });

    let preflight = match &importer {
        Some(_) if args.skip_preflight => {
            info!("preflight connection test skipped");
            None
        }
        Some(importer) => {
            let operator = operator(&args.confirm);
            Some(importer.preflight(operator.as_ref(), &SystemProcesses))
        }
        None => None,
    };

    let pipeline = Pipeline::new(&extractor, &series_map, importer.as_ref(), config.pace);
    let (files, summary) = pipeline.run(&candidates);

    let report = RunReport {
        manifest_version: 1,
        run_id,
        started_at,
        finished_at: now_utc_string(),
        library_path: config
            .import_enabled
            .then(|| config.library.library_path.display().to_string()),
        network_backed: importer
            .as_ref()
            .is_some_and(|importer| importer.environment().network_backed),
        import_enabled: config.import_enabled,
        preflight,
        summary,
        files,
    };

    if let Some(path) = &args.report_path {
        write_json_pretty(path, &report)?;
        info!(path = %path.display(), "wrote run report");
    }

    if args.json {
        write_json_response(&report)
    } else {
        write_text_response(&report.summary, &report.files)
    }
}

fn write_json_response(report: &RunReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, report)
        .context("failed to serialize import json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_response(summary: &RunSummary, files: &[FileReport]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    for file in files {
        writeln!(
            output,
            "{}\t{}\t{}\t{}",
            file.outcome.label(),
            file.filename,
            file.metadata.published_date,
            file.metadata.series.as_deref().unwrap_or("-")
        )?;
    }

    writeln!(
        output,
        "Processed: {} imported={} imported_without_metadata={} skipped={} failed={} elapsed={:.1}s",
        summary.processed,
        summary.imported,
        summary.imported_without_metadata,
        summary.skipped,
        summary.failed,
        summary.elapsed_seconds,
    )?;
    output.flush()?;
    Ok(())
}

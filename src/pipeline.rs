use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::catalog::CatalogTool;
use crate::clock::Pause;
use crate::extract::MetadataExtractor;
use crate::importer::Importer;
use crate::model::{CandidateFile, FileReport, ImportOutcome, RunSummary};
use crate::series_map::SeriesMap;
use crate::util::sha256_file;

const PROGRESS_EVERY: usize = 10;

pub struct Pipeline<'a, T, P> {
    extractor: &'a MetadataExtractor,
    series_map: &'a SeriesMap,
    importer: Option<&'a Importer<T, P>>,
    pace: Duration,
}

impl<'a, T: CatalogTool, P: Pause> Pipeline<'a, T, P> {
    pub fn new(
        extractor: &'a MetadataExtractor,
        series_map: &'a SeriesMap,
        importer: Option<&'a Importer<T, P>>,
        pace: Duration,
    ) -> Self {
        Self {
            extractor,
            series_map,
            importer,
            pace,
        }
    }

    pub fn run(&self, candidates: &[CandidateFile]) -> (Vec<FileReport>, RunSummary) {
        let started = Instant::now();
        let total = candidates.len();
        let mut summary = RunSummary::default();
        let mut reports = Vec::with_capacity(total);

        info!(
            files = total,
            import_enabled = self.importer.is_some(),
            "processing candidate files"
        );

        for (index, candidate) in candidates.iter().enumerate() {
            if index > 0 {
                if let Some(importer) = self.importer {
                    importer.pause().pause(self.pace);
                }
            }

            let report = self.process(candidate);
            summary.record(&report.outcome);
            reports.push(report);

            let done = index + 1;
            if done % PROGRESS_EVERY == 0 || done == total {
                log_progress(done, total, started.elapsed());
            }
        }

        summary.elapsed_seconds = started.elapsed().as_secs_f64();
        info!(
            processed = summary.processed,
            imported = summary.imported,
            imported_without_metadata = summary.imported_without_metadata,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed_secs = format!("{:.1}", summary.elapsed_seconds),
            "run complete"
        );

        (reports, summary)
    }

    fn process(&self, candidate: &CandidateFile) -> FileReport {
        let metadata = self.extractor.extract(&candidate.filename, self.series_map);
        if metadata.date_defaulted() {
            info!(
                file = %candidate.filename,
                date = %metadata.published_date,
                "no date in filename, using today"
            );
        }

        let sha256 = match sha256_file(&candidate.path) {
            Ok(digest) => Some(digest),
            Err(err) => {
                warn!(file = %candidate.path.display(), error = %err, "could not hash file");
                None
            }
        };

        let outcome = match self.importer {
            Some(importer) => importer.import(&candidate.path, &metadata),
            None => ImportOutcome::Skipped,
        };

        FileReport {
            path: candidate.path.display().to_string(),
            filename: candidate.filename.clone(),
            sha256,
            metadata,
            outcome,
        }
    }
}

fn log_progress(done: usize, total: usize, elapsed: Duration) {
    let seconds = elapsed.as_secs_f64();
    let rate = if seconds > 0.0 {
        done as f64 / seconds
    } else {
        0.0
    };
    let eta_secs = if rate > 0.0 {
        (total - done) as f64 / rate
    } else {
        0.0
    };

    info!(
        done,
        total,
        rate_per_sec = format!("{rate:.2}"),
        eta_secs = format!("{eta_secs:.0}"),
        "progress"
    );
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::catalog::testing::{ScriptedTool, fail, ok};
    use crate::clock::testing::RecordingPause;
    use crate::config::RetryPolicy;
    use crate::probe::LibraryEnvironment;

    fn candidates(dir: &Path, names: &[&str]) -> Vec<CandidateFile> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                fs::write(&path, name.as_bytes()).expect("write candidate");
                CandidateFile::from_path(&path).expect("candidate has filename")
            })
            .collect()
    }

    #[test]
    fn disabled_import_extracts_and_skips_every_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let files = candidates(dir.path(), &["Alpha_Report_2023-04-01.pdf", "notes.pdf"]);
        let extractor = MetadataExtractor::new().expect("extractor");
        let series_map = SeriesMap::new([("alpha", "Alpha Series")]);

        let pipeline: Pipeline<'_, ScriptedTool, RecordingPause> =
            Pipeline::new(&extractor, &series_map, None, Duration::from_millis(100));
        let (reports, summary) = pipeline.run(&files);

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 2);
        assert!(reports.iter().all(|r| r.outcome == ImportOutcome::Skipped));
        assert_eq!(reports[0].metadata.series.as_deref(), Some("Alpha Series"));
        assert!(reports[1].metadata.date_defaulted());
        assert!(reports.iter().all(|r| r.sha256.is_some()));
    }

    #[test]
    fn import_run_paces_between_files_and_counts_outcomes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let files = candidates(
            dir.path(),
            &["Alpha_2023-04-01.pdf", "Beta_2022-01-02.pdf", "Gamma_2021.pdf"],
        );
        let extractor = MetadataExtractor::new().expect("extractor");
        let series_map = SeriesMap::default();
        let tool = ScriptedTool::new([
            ok("Added book ids: 1"),
            ok(""),
            ok("Added book ids: 2"),
            fail("Invalid field"),
            fail("Unknown option"),
        ]);
        let pause = RecordingPause::default();
        let importer = Importer::new(
            &tool,
            &pause,
            LibraryEnvironment::local(dir.path()),
            RetryPolicy::default(),
        );

        let pipeline = Pipeline::new(
            &extractor,
            &series_map,
            Some(&importer),
            Duration::from_millis(100),
        );
        let (reports, summary) = pipeline.run(&files);

        assert_eq!(summary.imported, 2);
        assert_eq!(summary.imported_without_metadata, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(reports[2].outcome.label(), "failed");
        assert_eq!(pause.recorded(), vec![Duration::from_millis(100); 2]);
    }

    #[test]
    fn unreadable_file_still_gets_a_report() {
        let extractor = MetadataExtractor::new().expect("extractor");
        let series_map = SeriesMap::default();
        let missing = CandidateFile::from_path(Path::new("/definitely/missing/Report_2020.pdf"))
            .expect("candidate has filename");

        let pipeline: Pipeline<'_, ScriptedTool, RecordingPause> =
            Pipeline::new(&extractor, &series_map, None, Duration::ZERO);
        let (reports, summary) = pipeline.run(&[missing]);

        assert_eq!(summary.processed, 1);
        assert_eq!(reports[0].sha256, None);
        assert_eq!(reports[0].metadata.title, "Report_2020");
    }
}

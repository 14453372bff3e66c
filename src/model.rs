use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ImportError;
use crate::importer::PreflightReport;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub filename: String,
}

impl CandidateFile {
    pub fn from_path(path: &Path) -> Option<Self> {
        let filename = path.file_name()?.to_str()?.to_string();
        Some(Self {
            path: path.to_path_buf(),
            filename,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    Filename,
    DefaultToday,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedMetadata {
    pub title: String,
    pub published_date: NaiveDate,
    pub series: Option<String>,
    pub date_source: DateSource,
}

impl ExtractedMetadata {
    pub fn date_defaulted(&self) -> bool {
        self.date_source == DateSource::DefaultToday
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    pub error: ImportError,
    pub remediation: Vec<String>,
}

impl ImportFailure {
    pub fn new(error: ImportError) -> Self {
        Self {
            error,
            remediation: Vec::new(),
        }
    }

    pub fn with_remediation(mut self, remediation: Vec<String>) -> Self {
        self.remediation = remediation;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportOutcome {
    Imported {
        book_id: Option<String>,
        metadata_applied: bool,
        metadata_error: Option<ImportError>,
    },
    Skipped,
    Failed(ImportFailure),
}

impl ImportOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Imported {
                metadata_applied: true,
                ..
            } => "imported",
            Self::Imported { .. } => "imported-without-metadata",
            Self::Skipped => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    pub filename: String,
    pub sha256: Option<String>,
    pub metadata: ExtractedMetadata,
    pub outcome: ImportOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub imported: usize,
    pub imported_without_metadata: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed_seconds: f64,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &ImportOutcome) {
        self.processed += 1;
        match outcome {
            ImportOutcome::Imported {
                metadata_applied: true,
                ..
            } => self.imported += 1,
            ImportOutcome::Imported { .. } => {
                self.imported += 1;
                self.imported_without_metadata += 1;
            }
            ImportOutcome::Skipped => self.skipped += 1,
            ImportOutcome::Failed(_) => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub library_path: Option<String>,
    pub network_backed: bool,
    pub import_enabled: bool,
    pub preflight: Option<PreflightReport>,
    pub summary: RunSummary,
    pub files: Vec<FileReport>,
}

mod calibredb;
mod classify;

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::ExecError;

pub use calibredb::CalibreDb;
pub use classify::{FailureSignature, classify_failure};

const BOOK_IDS_MARKER: &str = "Added book ids:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    Direct,
    ThroughRunningInstance,
}

impl ConnectionMode {
    pub fn library_flag(self) -> &'static str {
        match self {
            Self::Direct => "--library-path",
            Self::ThroughRunningInstance => "--with-library",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn diagnostic_text(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

pub trait CatalogTool {
    fn executable(&self) -> &Path;

    fn invoke(&self, args: &[OsString], timeout: Duration) -> Result<ToolOutput, ExecError>;
}

impl<T: CatalogTool + ?Sized> CatalogTool for &T {
    fn executable(&self) -> &Path {
        (**self).executable()
    }

    fn invoke(&self, args: &[OsString], timeout: Duration) -> Result<ToolOutput, ExecError> {
        (**self).invoke(args, timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataField {
    PublishedDate(NaiveDate),
    Series(String),
}

impl MetadataField {
    fn render(&self) -> String {
        match self {
            Self::PublishedDate(date) => format!("pubdate:{}", date.format("%Y-%m-%d")),
            Self::Series(label) => format!("series:{label}"),
        }
    }
}

pub fn add_args(file: &Path, library: &Path, mode: ConnectionMode, title: &str) -> Vec<OsString> {
    vec![
        "add".into(),
        file.into(),
        mode.library_flag().into(),
        library.into(),
        "--title".into(),
        title.into(),
    ]
}

pub fn set_metadata_args(
    library: &Path,
    mode: ConnectionMode,
    book_id: &str,
    fields: &[MetadataField],
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "set_metadata".into(),
        mode.library_flag().into(),
        library.into(),
        book_id.into(),
    ];
    for field in fields {
        args.push("--field".into());
        args.push(field.render().into());
    }
    args
}

pub fn list_probe_args(library: &Path) -> Vec<OsString> {
    vec![
        "list".into(),
        ConnectionMode::Direct.library_flag().into(),
        library.into(),
        "--limit".into(),
        "1".into(),
    ]
}

pub fn parse_book_id(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let (_, rest) = line.split_once(BOOK_IDS_MARKER)?;
        let id = rest.split(',').next()?.trim();
        (!id.is_empty()).then(|| id.to_string())
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn add_args_switch_library_flag_by_mode() {
        let direct = add_args(
            Path::new("/in/a.pdf"),
            Path::new("/lib"),
            ConnectionMode::Direct,
            "a",
        );
        assert_eq!(
            strings(&direct),
            vec!["add", "/in/a.pdf", "--library-path", "/lib", "--title", "a"]
        );

        let routed = add_args(
            Path::new("/in/a.pdf"),
            Path::new("/lib"),
            ConnectionMode::ThroughRunningInstance,
            "a",
        );
        assert_eq!(strings(&routed)[2], "--with-library");
    }

    #[test]
    fn set_metadata_args_pass_both_fields_in_one_call() {
        let date = NaiveDate::from_ymd_opt(2023, 4, 1).expect("valid date");
        let args = set_metadata_args(
            Path::new("/lib"),
            ConnectionMode::Direct,
            "42",
            &[
                MetadataField::PublishedDate(date),
                MetadataField::Series("Alpha Series".to_string()),
            ],
        );

        assert_eq!(
            strings(&args),
            vec![
                "set_metadata",
                "--library-path",
                "/lib",
                "42",
                "--field",
                "pubdate:2023-04-01",
                "--field",
                "series:Alpha Series",
            ]
        );
    }

    #[test]
    fn parse_book_id_reads_marker_line() {
        let stdout = "Backing up metadata\nAdded book ids: 118\n";
        assert_eq!(parse_book_id(stdout).as_deref(), Some("118"));
        assert_eq!(parse_book_id("Added book ids: 5, 6").as_deref(), Some("5"));
        assert_eq!(parse_book_id("Added book ids:   \n"), None);
        assert_eq!(parse_book_id("nothing useful"), None);
    }

    #[test]
    fn diagnostic_text_prefers_stderr() {
        let output = ToolOutput {
            exit_code: Some(1),
            stdout: "stdout text".to_string(),
            stderr: "  stderr text \n".to_string(),
        };
        assert_eq!(output.diagnostic_text(), "stderr text");
        assert!(!output.success());
    }
}

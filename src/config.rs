use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{ImportArgs, LibraryArgs};
use crate::util::expand_home;

#[cfg(target_os = "macos")]
pub const DEFAULT_CALIBRE_CLI: &str = "/Applications/calibre.app/Contents/MacOS/calibredb";
#[cfg(not(target_os = "macos"))]
pub const DEFAULT_CALIBRE_CLI: &str = "calibredb";

pub const DEFAULT_LIBRARY_PATH: &str = "~/Documents/Calibre Library";
pub const DEFAULT_SERIES_MAP: &str = "series_mapping.json";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub tool_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            tool_timeout: TOOL_TIMEOUT,
            probe_timeout: PROBE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    pub library_path: PathBuf,
    pub tool_path: PathBuf,
}

impl LibraryConfig {
    pub fn from_args(args: &LibraryArgs) -> Self {
        let library_path = args
            .library_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new(DEFAULT_LIBRARY_PATH));

        Self {
            library_path: expand_home(library_path),
            tool_path: expand_home(&args.calibre_cli),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub library: LibraryConfig,
    pub import_enabled: bool,
    pub retry: RetryPolicy,
    pub pace: Duration,
}

impl RunConfig {
    pub fn from_import_args(args: &ImportArgs) -> Self {
        Self {
            library: LibraryConfig::from_args(&args.library),
            import_enabled: args.import_enabled && !args.no_import,
            retry: RetryPolicy {
                max_attempts: args.max_retries,
                ..RetryPolicy::default()
            },
            pace: Duration::from_millis(args.pace_ms),
        }
    }

    pub fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.import_enabled {
            return warnings;
        }

        if !self.library.library_path.is_dir() {
            warnings.push(format!(
                "library path {} is not a directory; catalog import disabled for this run",
                self.library.library_path.display()
            ));
            self.import_enabled = false;
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn import_args(extra: &[&str]) -> ImportArgs {
        let mut argv = vec!["pdf-intake", "import"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).expect("arguments should parse").command {
            Commands::Import(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn no_import_flag_overrides_enabled_setting() {
        let config = RunConfig::from_import_args(&import_args(&["--no-import"]));
        assert!(!config.import_enabled);
    }

    #[test]
    fn missing_library_disables_import_with_warning() {
        let mut config = RunConfig::from_import_args(&import_args(&[
            "--library-path",
            "/definitely/not/a/library",
        ]));
        let warnings = config.validate();

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("/definitely/not/a/library"));
        assert!(!config.import_enabled);
    }

    #[test]
    fn existing_library_passes_validation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = dir.path().to_string_lossy().into_owned();
        let mut config = RunConfig::from_import_args(&import_args(&[
            "--library-path",
            &library,
            "--max-retries",
            "5",
        ]));

        assert!(config.validate().is_empty());
        assert!(config.import_enabled);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.tool_timeout, TOOL_TIMEOUT);
    }
}

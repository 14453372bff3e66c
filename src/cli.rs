use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::{DEFAULT_CALIBRE_CLI, DEFAULT_MAX_ATTEMPTS, DEFAULT_SERIES_MAP};

#[derive(Parser, Debug)]
#[command(
    name = "pdf-intake",
    version,
    about = "Register PDFs in a calibre library with metadata inferred from their filenames"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Import(ImportArgs),
    Extract(ExtractArgs),
    Status(StatusArgs),
    Unlock(UnlockArgs),
}

#[derive(Args, Debug, Clone)]
pub struct LibraryArgs {
    #[arg(long, env = "CALIBRE_LIBRARY_PATH")]
    pub library_path: Option<PathBuf>,

    #[arg(long, env = "CALIBRE_CLI_PATH", default_value = DEFAULT_CALIBRE_CLI)]
    pub calibre_cli: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    #[arg(long, env = "SOURCE_FOLDER")]
    pub source: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_recursive: bool,

    pub files: Vec<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ConfirmArgs {
    #[arg(long, default_value_t = false, conflicts_with = "no_input")]
    pub yes: bool,

    #[arg(long, default_value_t = false)]
    pub no_input: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[command(flatten)]
    pub library: LibraryArgs,

    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub confirm: ConfirmArgs,

    #[arg(long, env = "SERIES_MAPPING_PATH", default_value = DEFAULT_SERIES_MAP)]
    pub series_map: PathBuf,

    #[arg(
        long = "import",
        env = "ENABLE_CALIBRE_IMPORT",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub import_enabled: bool,

    #[arg(long, default_value_t = false)]
    pub no_import: bool,

    #[arg(long, env = "CALIBRE_MAX_RETRIES", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_retries: u32,

    #[arg(long, default_value_t = 100)]
    pub pace_ms: u64,

    #[arg(long, default_value_t = false)]
    pub skip_preflight: bool,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(long, env = "SERIES_MAPPING_PATH", default_value = DEFAULT_SERIES_MAP)]
    pub series_map: PathBuf,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub library: LibraryArgs,
}

#[derive(Args, Debug, Clone)]
pub struct UnlockArgs {
    #[command(flatten)]
    pub library: LibraryArgs,

    #[command(flatten)]
    pub confirm: ConfirmArgs,
}

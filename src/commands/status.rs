use anyhow::Result;
use tracing::{info, warn};

use crate::catalog::CalibreDb;
use crate::cli::StatusArgs;
use crate::clock::ThreadPause;
use crate::config::{LibraryConfig, RetryPolicy};
use crate::importer::{Importer, ToolHealth};
use crate::locks::present_lock_artifacts;
use crate::probe::{CATALOG_PROCESS_NAME, LibraryEnvironment, find_running_instances};

pub fn run(args: StatusArgs) -> Result<()> {
    let config = LibraryConfig::from_args(&args.library);
    let library = &config.library_path;

    info!(
        library = %library.display(),
        calibredb = %config.tool_path.display(),
        "status requested"
    );

    if !library.is_dir() {
        warn!(library = %library.display(), "library directory missing");
        return Ok(());
    }

    let environment = LibraryEnvironment::detect(library);
    info!(network_backed = environment.network_backed, "library storage");

    let artifacts = present_lock_artifacts(library);
    if artifacts.is_empty() {
        info!("no lock artifacts present");
    } else {
        warn!(artifacts = %artifacts.join(", "), "lock artifacts present");
    }

    let running = find_running_instances(CATALOG_PROCESS_NAME);
    for process in &running {
        warn!(pid = process.pid, name = %process.name, "catalog process running");
    }
    if running.is_empty() {
        info!("no catalog processes running");
    }

    let importer = Importer::new(
        CalibreDb::new(config.tool_path.clone()),
        ThreadPause,
        environment,
        RetryPolicy::default(),
    );
    match importer.check_health() {
        ToolHealth::Ready => info!("catalog connection test passed"),
        health => warn!(health = ?health, "catalog connection test did not pass"),
    }

    Ok(())
}

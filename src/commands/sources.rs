use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::cli::SourceArgs;
use crate::model::CandidateFile;
use crate::util::expand_home;

pub fn collect_candidates(args: &SourceArgs) -> Result<Vec<CandidateFile>> {
    let paths = if !args.files.is_empty() {
        args.files.iter().map(|path| expand_home(path)).collect()
    } else if let Some(source) = &args.source {
        let source = expand_home(source);
        if !source.is_dir() {
            bail!("source folder does not exist: {}", source.display());
        }
        let mut found = discover_pdfs(&source, !args.no_recursive);
        found.sort();
        info!(
            source = %source.display(),
            recursive = !args.no_recursive,
            pdf_count = found.len(),
            "discovered PDFs"
        );
        found
    } else {
        bail!("no input: pass PDF paths or --source (SOURCE_FOLDER)");
    };

    let mut candidates = Vec::with_capacity(paths.len());
    for path in paths {
        match CandidateFile::from_path(&path) {
            Some(candidate) => candidates.push(candidate),
            None => warn!(path = %path.display(), "skipping path without a UTF-8 filename"),
        }
    }

    Ok(candidates)
}

pub fn discover_pdfs(root: &Path, recursive: bool) -> Vec<PathBuf> {
    let mut walker = WalkDir::new(root).follow_links(true);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut pdfs = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && is_pdf(entry.path()) {
                    pdfs.push(entry.into_path());
                }
            }
            Err(err) => warn!(error = %err, "skipping unreadable entry"),
        }
    }

    pdfs
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, b"%PDF-1.4").expect("write file");
    }

    fn source_args(source: &Path, no_recursive: bool) -> SourceArgs {
        SourceArgs {
            source: Some(source.to_path_buf()),
            no_recursive,
            files: Vec::new(),
        }
    }

    #[test]
    fn discovery_recurses_and_sorts_by_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("b.pdf"));
        touch(&dir.path().join("nested/a.PDF"));
        touch(&dir.path().join("nested/deeper/c.pdf"));
        touch(&dir.path().join("notes.txt"));

        let candidates = collect_candidates(&source_args(dir.path(), false)).expect("collect");
        let names: Vec<_> = candidates.iter().map(|c| c.filename.as_str()).collect();

        assert_eq!(names, vec!["b.pdf", "a.PDF", "c.pdf"]);
    }

    #[test]
    fn no_recursive_stays_in_top_folder() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("top.pdf"));
        touch(&dir.path().join("nested/inner.pdf"));

        let candidates = collect_candidates(&source_args(dir.path(), true)).expect("collect");

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].filename, "top.pdf");
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_pdfs_are_discovered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outside = tempfile::tempdir().expect("outside tempdir");
        touch(&dir.path().join("plain.pdf"));
        let target = outside.path().join("real.pdf");
        touch(&target);
        std::os::unix::fs::symlink(&target, dir.path().join("Weekly_2024-01-05.pdf"))
            .expect("create symlink");

        let mut found = discover_pdfs(dir.path(), true);
        found.sort();

        assert_eq!(
            found,
            vec![
                dir.path().join("Weekly_2024-01-05.pdf"),
                dir.path().join("plain.pdf"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn dangling_link_does_not_abort_discovery() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("kept.pdf"));
        std::os::unix::fs::symlink(
            dir.path().join("gone.pdf"),
            dir.path().join("broken.pdf"),
        )
        .expect("create dangling symlink");

        let found = discover_pdfs(dir.path(), true);

        assert_eq!(found, vec![dir.path().join("kept.pdf")]);
    }

    #[test]
    fn explicit_files_take_precedence_over_source() {
        let args = SourceArgs {
            source: Some(PathBuf::from("/definitely/missing")),
            no_recursive: false,
            files: vec![PathBuf::from("/in/Weekly_2024-01-05.pdf")],
        };

        let candidates = collect_candidates(&args).expect("collect");
        assert_eq!(candidates[0].filename, "Weekly_2024-01-05.pdf");
    }

    #[test]
    fn missing_input_is_an_error() {
        let args = SourceArgs {
            source: None,
            no_recursive: false,
            files: Vec::new(),
        };
        assert!(collect_candidates(&args).is_err());
        assert!(collect_candidates(&source_args(Path::new("/definitely/missing"), false)).is_err());
    }
}

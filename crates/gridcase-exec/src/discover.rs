//! Case discovery
//!
//! Walks the work-directory tree for runnable inputs. Single mode
//! collects every file matching the case naming convention (uppercase
//! name ending in `X`); batch mode collects only the configured batch
//! manifest. Each hit becomes one work item for the engine.

use std::fs;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use gridcase_core::{CaseFile, RunMode};

use crate::error::ExecError;

/// Collect every runnable case under a work directory
#[must_use]
pub fn discover_cases(work_dir: &Path, mode: RunMode, batch_file: &str) -> Vec<CaseFile> {
    let mut cases = Vec::new();
    for entry in WalkDir::new(work_dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy();
        let matches = match mode {
            RunMode::Single => name.to_uppercase().ends_with('X'),
            RunMode::Batch => name == batch_file,
        };
        if !matches {
            continue;
        }
        let Some(dir) = entry.path().parent() else {
            continue;
        };
        cases.push(CaseFile::new(dir, name.into_owned()));
    }
    debug!(count = cases.len(), "discovered cases");
    cases
}

/// Write the discovered run list instead of executing it
///
/// One `dir<TAB>file` line per case, for operators that feed an
/// external scheduler.
///
/// # Errors
/// Returns `ExecError::Io` when the list cannot be written.
pub fn export_runlist(cases: &[CaseFile], path: &Path) -> Result<(), ExecError> {
    let mut body = String::new();
    for case in cases {
        body.push_str(&format!("{}\t{}\n", case.dir.display(), case.file));
    }
    fs::write(path, body).map_err(|source| ExecError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn single_mode_matches_the_naming_convention() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("1_000N/2_000E/MAIZE.CSX"));
        touch(&dir.path().join("1_000N/3_000E/sorg.snx"));
        touch(&dir.path().join("1_000N/2_000E/WEATHER.WTH"));
        touch(&dir.path().join("BATCHLIST.RUN"));

        let mut cases = discover_cases(dir.path(), RunMode::Single, "BATCHLIST.RUN");
        cases.sort_by(|a, b| a.file.cmp(&b.file));

        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].file, "MAIZE.CSX");
        // lowercase names still count once uppercased
        assert_eq!(cases[1].file, "sorg.snx");
    }

    #[test]
    fn batch_mode_matches_only_the_manifest() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("1_000N/2_000E/MAIZE00.CSX"));
        touch(&dir.path().join("1_000N/2_000E/BATCHLIST.RUN"));

        let cases = discover_cases(dir.path(), RunMode::Batch, "BATCHLIST.RUN");

        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].file, "BATCHLIST.RUN");
        assert!(cases[0].dir.ends_with("1_000N/2_000E"));
    }

    #[test]
    fn runlist_export_lists_every_case() {
        let dir = tempfile::tempdir().unwrap();
        let cases = vec![
            CaseFile::new("/a/b", "ONE.CSX"),
            CaseFile::new("/c/d", "TWO.CSX"),
        ];
        let out = dir.path().join("runlist.txt");

        export_runlist(&cases, &out).unwrap();
        let body = fs::read_to_string(&out).unwrap();

        assert_eq!(body, "/a/b\tONE.CSX\n/c/d\tTWO.CSX\n");
    }
}

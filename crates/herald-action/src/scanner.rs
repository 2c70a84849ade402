//! Single-level directory listing used by the loader.

use std::path::{Path, PathBuf};

use crate::loader::LoadWarning;

/// Which direct children of a directory to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Files,
    Directories,
}

/// Result of listing one directory.
#[derive(Debug, Default)]
pub struct Listing {
    /// Matching entries, sorted by path.
    pub entries: Vec<PathBuf>,
    /// Set when the directory could not be listed.
    pub warning: Option<LoadWarning>,
}

/// List the direct children of `dir` matching `mode`.
///
/// A missing or unreadable directory yields an empty listing and a warning
/// instead of an error. Entries that cannot be inspected are skipped.
pub fn scan(dir: &Path, mode: ScanMode) -> Listing {
    let read = match std::fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) => {
            let warning = if e.kind() == std::io::ErrorKind::NotFound {
                LoadWarning::MissingDirectory {
                    path: dir.to_path_buf(),
                }
            } else {
                LoadWarning::Unreadable {
                    path: dir.to_path_buf(),
                    message: e.to_string(),
                }
            };
            tracing::warn!(path = %dir.display(), "{}", warning);
            return Listing {
                entries: Vec::new(),
                warning: Some(warning),
            };
        }
    };

    let mut entries: Vec<PathBuf> = read
        .filter_map(|entry| entry.ok())
        .filter(|entry| match entry.file_type() {
            Ok(ft) => match mode {
                ScanMode::Files => ft.is_file(),
                ScanMode::Directories => ft.is_dir(),
            },
            Err(_) => false,
        })
        .map(|entry| entry.path())
        .collect();
    entries.sort();

    Listing {
        entries,
        warning: None,
    }
}

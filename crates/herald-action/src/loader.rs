//! Descriptor discovery: `<root>/<kind>/<category>/<file>.toml`.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::descriptor::{ActionKind, Descriptor};
use crate::error::LoadError;
use crate::scanner::{scan, ScanMode};

const DESCRIPTOR_EXTENSION: &str = "toml";

/// A non-fatal problem found while loading.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadWarning {
    MissingDirectory { path: PathBuf },
    Unreadable { path: PathBuf, message: String },
    Skipped {
        kind: ActionKind,
        path: PathBuf,
        reason: String,
    },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::MissingDirectory { path } => write!(
                f,
                "Directory {} does not exist; create it to add actions there, or ignore this if the kind is unused",
                path.display()
            ),
            LoadWarning::Unreadable { path, message } => {
                write!(f, "Directory {} could not be read: {}", path.display(), message)
            }
            LoadWarning::Skipped { kind, path, reason } => {
                write!(f, "Skipped {} {}: {}", kind, path.display(), reason)
            }
        }
    }
}

/// Descriptors loaded for one or more kinds, plus the warnings collected on
/// the way.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub descriptors: Vec<Descriptor>,
    pub warnings: Vec<LoadWarning>,
}

impl LoadReport {
    /// Route a per-file failure through the kind's policy: fatal for
    /// mandatory kinds, a recorded skip otherwise.
    pub(crate) fn reject(&mut self, kind: ActionKind, err: LoadError) -> Result<(), LoadError> {
        if kind.is_mandatory() {
            return Err(err);
        }
        tracing::warn!(%kind, path = %err.path().display(), error = %err, "Skipping action descriptor");
        self.warnings.push(LoadWarning::Skipped {
            kind,
            path: err.path().to_path_buf(),
            reason: err.to_string(),
        });
        Ok(())
    }

    pub fn count(&self, kind: ActionKind) -> usize {
        self.descriptors.iter().filter(|d| d.kind() == kind).count()
    }

    fn merge(&mut self, other: LoadReport) {
        self.descriptors.extend(other.descriptors);
        self.warnings.extend(other.warnings);
    }
}

/// Walks the actions root and parses descriptors.
#[derive(Debug, Clone)]
pub struct Loader {
    root: PathBuf,
    exceptions: HashSet<String>,
}

impl Loader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exceptions: HashSet::new(),
        }
    }

    /// Exclude descriptors whose identifier is listed.
    pub fn with_exceptions<I, S>(mut self, exceptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exceptions = exceptions.into_iter().map(Into::into).collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind_root(&self, kind: ActionKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Load every kind. Fails only on a mandatory-kind error.
    pub fn load_all(&self) -> Result<LoadReport, LoadError> {
        let mut report = LoadReport::default();
        for kind in ActionKind::ALL {
            report.merge(self.load_kind(kind)?);
        }
        Ok(report)
    }

    /// Load one kind's descriptors from its category directories.
    pub fn load_kind(&self, kind: ActionKind) -> Result<LoadReport, LoadError> {
        let mut report = LoadReport::default();

        let categories = scan(&self.kind_root(kind), ScanMode::Directories);
        report.warnings.extend(categories.warning);

        for category in categories.entries {
            let files = scan(&category, ScanMode::Files);
            report.warnings.extend(files.warning);

            for file in files.entries.iter().filter(|p| is_descriptor(p)) {
                match Descriptor::from_file(file, kind) {
                    Ok(descriptor) => {
                        let id = descriptor.id();
                        if self.exceptions.contains(&id) {
                            tracing::debug!(%kind, %id, "Action excluded by exceptions list");
                            continue;
                        }
                        report.descriptors.push(descriptor);
                    }
                    Err(err) => report.reject(kind, err)?,
                }
            }
        }

        tracing::debug!(
            %kind,
            loaded = report.descriptors.len(),
            warnings = report.warnings.len(),
            "Action kind loaded"
        );
        Ok(report)
    }

    /// Find the file defining `id` without loading the whole kind.
    ///
    /// Files are parsed in scan order until one matches; unparsable files
    /// are passed over.
    pub fn locate(&self, kind: ActionKind, id: &str) -> Option<PathBuf> {
        let categories = scan(&self.kind_root(kind), ScanMode::Directories);
        categories.entries.iter().find_map(|category| {
            scan(category, ScanMode::Files)
                .entries
                .into_iter()
                .filter(|p| is_descriptor(p))
                .find(|file| {
                    Descriptor::from_file(file, kind)
                        .map(|d| d.id() == id)
                        .unwrap_or(false)
                })
        })
    }
}

fn is_descriptor(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(DESCRIPTOR_EXTENSION)
}

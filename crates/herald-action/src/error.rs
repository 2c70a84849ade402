//! Error types for action loading and invocation.

use std::path::{Path, PathBuf};

use herald_core::error::HeraldError;

use crate::descriptor::ActionKind;

/// A descriptor file that could not be turned into a registered action.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("Missing required field `{field}` in {}", path.display())]
    MissingField { path: PathBuf, field: &'static str },
    #[error("Invalid descriptor {}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },
    #[error("Unknown handler `{handler}` referenced by {}", path.display())]
    UnknownHandler { path: PathBuf, handler: String },
    #[error("Duplicate {kind} `{id}` in {} (first defined in {})", second.display(), first.display())]
    Duplicate {
        kind: ActionKind,
        id: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl LoadError {
    /// The descriptor file the error is attributed to.
    pub fn path(&self) -> &Path {
        match self {
            LoadError::Io { path, .. }
            | LoadError::Parse { path, .. }
            | LoadError::MissingField { path, .. }
            | LoadError::Invalid { path, .. }
            | LoadError::UnknownHandler { path, .. } => path,
            LoadError::Duplicate { second, .. } => second,
        }
    }
}

impl From<LoadError> for HeraldError {
    fn from(err: LoadError) -> Self {
        HeraldError::Load(err.to_string())
    }
}

/// Errors from the chat-platform collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlatformError {
    #[error("Platform request failed: {0}")]
    Request(String),
    #[error("Interaction already acknowledged")]
    AlreadyAcknowledged,
    #[error("Platform unavailable")]
    Unavailable,
}

impl From<PlatformError> for HeraldError {
    fn from(err: PlatformError) -> Self {
        HeraldError::Platform(err.to_string())
    }
}

/// Errors raised inside a handler invocation.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Action handler failed: {0}")]
    HandlerFailed(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Action execution timed out after {0} seconds")]
    Timeout(u64),
    #[error("Action handler panicked: {0}")]
    Panicked(String),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_display() {
        let err = LoadError::MissingField {
            path: PathBuf::from("commands/general/ping.toml"),
            field: "name",
        };
        assert_eq!(
            err.to_string(),
            "Missing required field `name` in commands/general/ping.toml"
        );

        let err = LoadError::UnknownHandler {
            path: PathBuf::from("buttons/ui/close.toml"),
            handler: "close".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown handler `close` referenced by buttons/ui/close.toml"
        );
    }

    #[test]
    fn test_load_error_path() {
        let err = LoadError::Duplicate {
            kind: ActionKind::Button,
            id: "close".to_string(),
            first: PathBuf::from("a.toml"),
            second: PathBuf::from("b.toml"),
        };
        assert_eq!(err.path(), Path::new("b.toml"));
        assert!(err.to_string().contains("button `close`"));
    }

    #[test]
    fn test_load_error_into_herald_error() {
        let err = LoadError::Parse {
            path: PathBuf::from("x.toml"),
            message: "expected `=`".to_string(),
        };
        let herald: HeraldError = err.into();
        assert!(matches!(herald, HeraldError::Load(_)));
        assert!(herald.to_string().contains("x.toml"));
    }

    #[test]
    fn test_action_error_display() {
        let err = ActionError::HandlerFailed("connection reset".to_string());
        assert_eq!(err.to_string(), "Action handler failed: connection reset");

        let err = ActionError::Timeout(30);
        assert_eq!(
            err.to_string(),
            "Action execution timed out after 30 seconds"
        );

        let err: ActionError = PlatformError::AlreadyAcknowledged.into();
        assert_eq!(err.to_string(), "Interaction already acknowledged");
    }
}

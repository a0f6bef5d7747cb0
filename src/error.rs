use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failure category, surfaced to callers so they can tell a bad manifest
/// apart from a flaky network or a full disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Configuration,
    Transport,
    Patch,
    Io,
}

#[derive(Debug, Error)]
pub enum VendorError {
    #[error("invalid module {module}: {reason}")]
    Configuration { module: String, reason: String },

    #[error("failed to fetch {module}: {message}")]
    Transport { module: String, message: String },

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl VendorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Patch(_) => ErrorKind::Patch,
            Self::Io { .. } | Self::WorkerPool(_) => ErrorKind::Io,
        }
    }

    pub fn configuration(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            module: module.into(),
            reason: reason.into(),
        }
    }

    pub fn transport(module: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            module: module.into(),
            message: message.to_string(),
        }
    }

    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// A patcher could not rewrite a file. Never fatal: the file is vendored as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("missing syntax declaration")]
    MissingSyntax,
}

pub type Result<T, E = VendorError> = std::result::Result<T, E>;

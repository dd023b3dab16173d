use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Everything that can stop a backup run before or during the real transfer.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("No rsync found! (expecting {expected}, nothing on PATH either)")]
    RsyncNotFound { expected: PathBuf },

    #[error("No backup destination! (none of {tried} candidate(s) is accessible)")]
    NoDestinationAvailable { tried: usize },

    #[error("No files or folders to backup! ({skipped} requested path(s) inaccessible)")]
    NoSourcesAvailable { skipped: usize },

    #[error("Test backup could not run: {reason}")]
    ProbeFailed {
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Lost the output stream of {program}: {source}")]
    Stream {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {}", humantime::format_duration(*after))]
    TimedOut { program: String, after: Duration },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Which abort path a [`BackupError`] takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortKind {
    Precondition,
    Subprocess,
}

impl BackupError {
    pub fn probe(reason: impl Into<String>, source: Option<std::io::Error>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
            source,
        }
    }

    pub fn kind(&self) -> AbortKind {
        match self {
            Self::Spawn { .. } | Self::Stream { .. } | Self::TimedOut { .. } => {
                AbortKind::Subprocess
            }
            _ => AbortKind::Precondition,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;

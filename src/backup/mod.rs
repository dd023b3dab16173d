pub mod command;
pub mod confirm;
pub mod exclude;
pub mod executor;
pub mod flags;
pub mod orchestrator;
pub mod paths;
pub mod probe;
pub mod report;
pub mod rsync;
pub mod stats;

pub use command::{CommandBuilder, ToolInvocation};
pub use confirm::{AutoConfirm, Confirm, StdinConfirm};
pub use executor::{Execution, RsyncExecutor, TransferRunner};
pub use flags::FlagSet;
pub use orchestrator::{Orchestrator, RunOutcome, RunResult, RunState};
pub use paths::PathResolver;
pub use probe::CompatibilityProbe;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// How the destination filesystem is treated for the real transfer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityMode {
    /// Permissions, links, devices and times are preserved (`--archive`).
    Native,
    /// FAT32/NTFS-class target: files are compared by size only.
    Fallback,
}

impl fmt::Display for CompatibilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Fallback => f.write_str("NTFS/FAT32 compatibility"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Missing,
    PermissionDenied,
    Unreadable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("does not exist"),
            Self::PermissionDenied => f.write_str("permission denied"),
            Self::Unreadable => f.write_str("unreadable"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedSource {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Requested sources split into the ones that go to rsync and the ones left behind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSet {
    pub reachable: Vec<PathBuf>,
    pub skipped: Vec<SkippedSource>,
}

impl SourceSet {
    pub fn total(&self) -> usize {
        self.reachable.len() + self.skipped.len()
    }

    /// A run needs at least one reachable source.
    pub fn ensure_reachable(&self) -> crate::error::Result<()> {
        if self.reachable.is_empty() {
            return Err(crate::error::BackupError::NoSourcesAvailable {
                skipped: self.skipped.len(),
            });
        }
        Ok(())
    }
}

use super::command::CommandBuilder;
use super::executor::{Execution, TransferRunner};
use super::flags::FlagSet;
use super::CompatibilityMode;
use crate::error::{BackupError, Result};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

pub const PROBE_FILE_NAME: &str = ".backup-mirror-probe";
pub const PROBE_FILE_SIZE: u64 = 100;

/// Size and mtime of the probe copy found at the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeCopy {
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Trial transfer of a known control file to find out what the destination supports.
pub struct CompatibilityProbe<'a> {
    runner: &'a dyn TransferRunner,
    freshness: Duration,
}

impl<'a> CompatibilityProbe<'a> {
    pub fn new(runner: &'a dyn TransferRunner, freshness: Duration) -> Self {
        Self { runner, freshness }
    }

    pub async fn run(
        &self,
        program: &Path,
        flags: &FlagSet,
        destination: &Path,
    ) -> Result<CompatibilityMode> {
        info!("Performing test backup to {}", destination.display());

        // A leftover copy from an interrupted run would pass for a fresh one.
        let copy_path = destination.join(PROBE_FILE_NAME);
        match std::fs::remove_file(&copy_path) {
            Ok(()) => debug!("Removed stale probe file {}", copy_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(BackupError::probe(
                    "cannot remove a stale probe file at the destination",
                    Some(e),
                ))
            }
        }

        let scratch = tempfile::Builder::new()
            .prefix("backup-mirror-")
            .tempdir()
            .map_err(|e| BackupError::probe("cannot create the control file", Some(e)))?;
        let control = scratch.path().join(PROBE_FILE_NAME);
        std::fs::write(&control, control_contents())
            .map_err(|e| BackupError::probe("cannot write the control file", Some(e)))?;

        let invocation =
            CommandBuilder::new(program, flags.clone()).build(&[control], destination);
        let execution = self.runner.run(&invocation, None).await.map_err(|e| match e {
            BackupError::Spawn { program, source } => {
                BackupError::probe(format!("cannot start {program}"), Some(source))
            }
            other => BackupError::probe(other.to_string(), None),
        })?;

        let copy = std::fs::metadata(&copy_path).ok().map(|m| ProbeCopy {
            size: m.len(),
            modified: m.modified().ok(),
        });
        debug!(?copy, exit_code = ?execution.exit_code, "Probe finished");

        let mode = classify(&execution, copy, SystemTime::now(), self.freshness);

        if copy.is_some() {
            if let Err(e) = std::fs::remove_file(&copy_path) {
                warn!("Could not remove probe file {}: {}", copy_path.display(), e);
            }
        }

        let mode = mode?;
        if mode == CompatibilityMode::Fallback {
            warn!("Test backup failed. Activating NTFS/FAT32 compatibility mode...");
        }
        Ok(mode)
    }
}

/// NATIVE only if the trial succeeded and left a full-size, fresh copy behind.
pub fn classify(
    execution: &Execution,
    copy: Option<ProbeCopy>,
    now: SystemTime,
    freshness: Duration,
) -> Result<CompatibilityMode> {
    let Some(copy) = copy else {
        return Err(BackupError::probe(
            match execution.errors.last() {
                Some(line) => format!("destination is not writable ({line})"),
                None => "destination is not writable".to_string(),
            },
            None,
        ));
    };

    let threshold = now.checked_sub(freshness).unwrap_or(SystemTime::UNIX_EPOCH);
    let fresh = copy.modified.is_some_and(|t| t > threshold);
    let complete = copy.size == PROBE_FILE_SIZE;

    if execution.success && fresh && complete {
        Ok(CompatibilityMode::Native)
    } else {
        debug!(
            success = execution.success,
            fresh, complete, "Probe copy does not match the control file"
        );
        Ok(CompatibilityMode::Fallback)
    }
}

fn control_contents() -> Vec<u8> {
    let mut bytes = b"backup-mirror compatibility probe\n".to_vec();
    bytes.resize(PROBE_FILE_SIZE as usize - 1, b'.');
    bytes.push(b'\n');
    bytes
}

use super::orchestrator::{RunOutcome, RunResult};
use super::stats::TransferSummary;
use super::SkippedSource;
use crate::utils::time::format_elapsed;
use std::fmt::Write;
use std::path::PathBuf;

pub fn backup_list(sources: &[PathBuf]) -> String {
    let mut out = String::from("Backup list:\n");
    for source in sources {
        let _ = writeln!(out, "  => {}", source.display());
    }
    out
}

pub fn inaccessible(skipped: &[SkippedSource]) -> String {
    let mut out = format!(
        "{} files/folders inaccessible (try running as root):\n",
        skipped.len()
    );
    for entry in skipped {
        let _ = writeln!(out, "  => {} ({})", entry.path.display(), entry.reason);
    }
    out
}

fn summary(summary: &TransferSummary) -> String {
    let mut parts = vec![format!("{} file(s) transferred", summary.files_transferred)];
    if let (Some(sent), Some(received)) = (summary.bytes_sent, summary.bytes_received) {
        parts.push(format!("{sent} bytes sent, {received} bytes received"));
    }
    if let Some(speedup) = summary.speedup {
        parts.push(format!("speedup {speedup:.2}"));
    }
    parts.join(", ")
}

/// Closing block for a run that reached the Reporting state.
pub fn completion(result: &RunResult) -> String {
    let mut out = String::new();
    let elapsed = result.elapsed.map(format_elapsed).unwrap_or_else(|| "--:--:--".into());

    match &result.outcome {
        RunOutcome::Completed { exit_code: Some(0) } => {
            let _ = writeln!(out, "Backup complete!  Time elapsed: {elapsed}");
        }
        RunOutcome::Completed { exit_code } => {
            let code = exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string());
            let _ = writeln!(
                out,
                "Backup finished with errors (rsync exit status {code}).  Time elapsed: {elapsed}"
            );
            for line in &result.errors {
                let _ = writeln!(out, "  !! {line}");
            }
        }
        _ => {}
    }

    if let Some(stats) = result.summary.as_ref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "Transfer: {}", summary(stats));
    }
    let _ = writeln!(
        out,
        "Sources: {} backed up, {} inaccessible",
        result.sources.reachable.len(),
        result.sources.skipped.len()
    );
    out
}

pub fn aborted(reason: &str) -> String {
    if reason.is_empty() {
        "Backup aborted!".to_string()
    } else {
        format!("Backup aborted! {reason}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::{SkipReason, SourceSet};
    use std::time::Duration;

    fn result(outcome: RunOutcome) -> RunResult {
        let mut result = RunResult::new();
        result.outcome = outcome;
        result.elapsed = Some(Duration::from_secs(3_725));
        result.sources = SourceSet {
            reachable: vec![PathBuf::from("/a"), PathBuf::from("/b")],
            skipped: vec![SkippedSource {
                path: PathBuf::from("/c"),
                reason: SkipReason::PermissionDenied,
            }],
        };
        result
    }

    #[test]
    fn test_inaccessible_names_each_entry() {
        let text = inaccessible(&[SkippedSource {
            path: PathBuf::from("/var/lib/mysql"),
            reason: SkipReason::PermissionDenied,
        }]);
        assert_eq!(
            text,
            "1 files/folders inaccessible (try running as root):\n  => /var/lib/mysql (permission denied)\n"
        );
    }

    #[test]
    fn test_backup_list() {
        let text = backup_list(&[PathBuf::from("/home/me/Documents")]);
        assert_eq!(text, "Backup list:\n  => /home/me/Documents\n");
    }

    #[test]
    fn test_clean_completion() {
        let text = completion(&result(RunOutcome::Completed { exit_code: Some(0) }));
        assert!(text.starts_with("Backup complete!  Time elapsed: 01:02:05"));
        assert!(text.contains("Sources: 2 backed up, 1 inaccessible"));
    }

    #[test]
    fn test_completion_with_tool_errors() {
        let mut failed = result(RunOutcome::Completed { exit_code: Some(23) });
        failed.errors = vec!["rsync: send_files failed".to_string()];
        let text = completion(&failed);
        assert!(text.contains("rsync exit status 23"));
        assert!(text.contains("  !! rsync: send_files failed"));
    }

    #[test]
    fn test_aborted_notice() {
        assert_eq!(aborted(""), "Backup aborted!");
        assert_eq!(
            aborted("No backup destination!"),
            "Backup aborted! No backup destination!"
        );
    }
}

use super::command::CommandBuilder;
use super::confirm::Confirm;
use super::exclude::effective_patterns;
use super::executor::TransferRunner;
use super::flags::FlagSet;
use super::paths::PathResolver;
use super::probe::CompatibilityProbe;
use super::report;
use super::rsync::locate_rsync;
use super::stats::TransferSummary;
use super::{CompatibilityMode, SourceSet};
use crate::error::{AbortKind, BackupError};
use crate::utils::config::Config;
use crate::utils::time::format_elapsed;
use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Where the human-readable run report goes.
pub type Console = Box<dyn Write + Send>;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    Resolving,
    Probing,
    Building,
    AwaitingConfirmation,
    Executing,
    Reporting,
    Done,
    Aborted,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The real transfer ran; `exit_code` is rsync's own status.
    Completed { exit_code: Option<i32> },
    /// The user said no at the confirmation prompt.
    Declined,
    PreconditionFailed { reason: String },
    SubprocessFailed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub outcome: RunOutcome,
    pub started_at: DateTime<Local>,
    #[serde(serialize_with = "serialize_elapsed")]
    pub elapsed: Option<Duration>,
    pub destination: Option<PathBuf>,
    pub mode: Option<CompatibilityMode>,
    pub sources: SourceSet,
    pub summary: Option<TransferSummary>,
    pub errors: Vec<String>,
    #[serde(skip)]
    pub states: Vec<RunState>,
}

impl RunResult {
    pub fn new() -> Self {
        Self {
            outcome: RunOutcome::Completed { exit_code: None },
            started_at: Local::now(),
            elapsed: None,
            destination: None,
            mode: None,
            sources: SourceSet::default(),
            summary: None,
            errors: Vec::new(),
            states: vec![RunState::Init],
        }
    }

    /// Process exit status for this run.
    pub fn exit_code(&self) -> i32 {
        match &self.outcome {
            RunOutcome::Completed { exit_code: Some(code) } => *code,
            RunOutcome::Completed { exit_code: None } => 1,
            RunOutcome::Declined => 0,
            RunOutcome::PreconditionFailed { .. } => 2,
            RunOutcome::SubprocessFailed { .. } => 3,
        }
    }

    pub fn abort_reason(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::Completed { .. } => None,
            RunOutcome::Declined => Some(""),
            RunOutcome::PreconditionFailed { reason } | RunOutcome::SubprocessFailed { reason } => {
                Some(reason.as_str())
            }
        }
    }

    fn enter(&mut self, state: RunState) {
        debug!(from = ?self.states.last(), to = ?state, "Run state transition");
        self.states.push(state);
    }
}

impl Default for RunResult {
    fn default() -> Self {
        Self::new()
    }
}

fn serialize_elapsed<S: Serializer>(elapsed: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match elapsed {
        Some(d) => s.serialize_some(&format_elapsed(*d)),
        None => s.serialize_none(),
    }
}

enum Abort {
    Declined,
    Failed(BackupError),
}

impl From<BackupError> for Abort {
    fn from(err: BackupError) -> Self {
        Self::Failed(err)
    }
}

/// Drives one run: resolve, probe, build, confirm, execute, report.
pub struct Orchestrator<'a> {
    config: &'a Config,
    resolver: PathResolver,
    runner: &'a dyn TransferRunner,
    confirm: &'a dyn Confirm,
    console: Mutex<Console>,
    search_path: Option<OsString>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a Config,
        resolver: PathResolver,
        runner: &'a dyn TransferRunner,
        confirm: &'a dyn Confirm,
    ) -> Self {
        Self {
            config,
            resolver,
            runner,
            confirm,
            console: Mutex::new(Box::new(std::io::stdout())),
            search_path: std::env::var_os("PATH"),
        }
    }

    pub fn with_console(mut self, console: Console) -> Self {
        self.console = Mutex::new(console);
        self
    }

    /// Directories searched for rsync when it is not at the configured path.
    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    fn emit(&self, text: &str) {
        let mut console = self.console.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = console.write_all(text.as_bytes()).and_then(|_| console.flush()) {
            warn!("Could not write to console: {}", e);
        }
    }

    /// Never fails: every abort is recorded in the returned [`RunResult`].
    pub async fn run(&self) -> RunResult {
        let mut result = RunResult::new();

        match self.drive(&mut result).await {
            Ok(()) => result.enter(RunState::Done),
            Err(Abort::Declined) => {
                info!("Backup declined at confirmation");
                result.outcome = RunOutcome::Declined;
                result.enter(RunState::Aborted);
            }
            Err(Abort::Failed(err)) => {
                error!("Backup aborted: {}", err);
                let reason = err.to_string();
                result.outcome = match err.kind() {
                    AbortKind::Precondition => RunOutcome::PreconditionFailed { reason },
                    AbortKind::Subprocess => RunOutcome::SubprocessFailed { reason },
                };
                result.enter(RunState::Aborted);
            }
        }
        result
    }

    async fn drive(&self, result: &mut RunResult) -> Result<(), Abort> {
        result.enter(RunState::Resolving);
        let destination = self.resolver.resolve_destination(&self.config.destinations)?;
        result.destination = Some(destination.clone());

        result.sources = self.resolver.resolve_sources(&self.config.sources);
        if self.config.show_inaccessible && !result.sources.skipped.is_empty() {
            self.emit(&report::inaccessible(&result.sources.skipped));
        }
        result.sources.ensure_reachable()?;
        let rsync = locate_rsync(&self.config.rsync_path, self.search_path.as_deref())?;

        result.enter(RunState::Probing);
        let base = FlagSet::base();
        let mode = CompatibilityProbe::new(self.runner, self.config.freshness_tolerance)
            .run(&rsync, &base, &destination)
            .await?;
        result.mode = Some(mode);

        result.enter(RunState::Building);
        let invocation = CommandBuilder::new(rsync, base.for_mode(mode))
            .verbose(self.config.verbose)
            .excludes(&effective_patterns(&self.config.excludes))
            .low_priority(self.config.low_priority)
            .build(&result.sources.reachable, &destination);

        if self.config.show_backup_list {
            self.emit(&report::backup_list(&result.sources.reachable));
        }
        self.emit(&format!(
            "Backing up to: '{}' ({} mode)\nAbout to run command: {}\n",
            destination.display(),
            mode,
            invocation.preview()
        ));

        result.enter(RunState::AwaitingConfirmation);
        if !self.confirm.confirm("Proceed?") {
            return Err(Abort::Declined);
        }

        result.enter(RunState::Executing);
        self.emit("Proceeding with backup, please wait...\n");
        let mut forward = |line: &str| self.emit(&format!("{line}\n"));
        let sink = if self.config.verbose {
            Some(&mut forward as &mut (dyn FnMut(&str) + Send))
        } else {
            None
        };
        let execution = self.runner.run(&invocation, sink).await?;

        result.enter(RunState::Reporting);
        result.elapsed = Some(execution.elapsed);
        result.summary = Some(execution.summary);
        result.errors = execution.errors;
        result.outcome = RunOutcome::Completed {
            exit_code: execution.exit_code,
        };
        self.emit(&format!("\n{}", report::completion(result)));
        Ok(())
    }
}

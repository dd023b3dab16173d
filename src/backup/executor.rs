use super::command::ToolInvocation;
use super::stats::TransferSummary;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tracing::{debug, info, warn};

/// Keep only the tail of stderr for the final report.
const MAX_ERROR_LINES: usize = 20;

/// Receives stdout lines as they arrive.
pub type LineSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// What happened to a subprocess that did start.
#[derive(Debug, Clone, Default)]
pub struct Execution {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub elapsed: Duration,
    pub summary: TransferSummary,
    pub errors: Vec<String>,
}

/// Runs a [`ToolInvocation`] to completion.
///
/// An `Err` means the process could not be run or read from at all. A process
/// that ran and exited non-zero is an `Ok` with `success == false`.
#[async_trait]
pub trait TransferRunner: Send + Sync {
    async fn run(
        &self,
        invocation: &ToolInvocation,
        sink: Option<LineSink<'_>>,
    ) -> Result<Execution>;
}

pub struct RsyncExecutor {
    timeout: Option<Duration>,
}

impl RsyncExecutor {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl TransferRunner for RsyncExecutor {
    async fn run(
        &self,
        invocation: &ToolInvocation,
        sink: Option<LineSink<'_>>,
    ) -> Result<Execution> {
        let program = invocation.program_name();
        debug!(command = %invocation.preview(), "Spawning {}", program);

        let started = Instant::now();
        let mut child = invocation
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BackupError::Spawn {
                program: program.clone(),
                source,
            })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(BackupError::Stream {
                program,
                source: std::io::Error::other("output pipes were not captured"),
            });
        };

        let drained = drain(child, stdout, stderr, sink, &program);
        let mut execution = match self.timeout {
            // Dropping the future drops the child, and kill_on_drop terminates it.
            Some(limit) => tokio::time::timeout(limit, drained)
                .await
                .map_err(|_| BackupError::TimedOut {
                    program: program.clone(),
                    after: limit,
                })??,
            None => drained.await?,
        };
        execution.elapsed = started.elapsed();

        info!(
            exit_code = ?execution.exit_code,
            elapsed = %humantime::format_duration(Duration::from_secs(execution.elapsed.as_secs())),
            "{} finished",
            program
        );
        Ok(execution)
    }
}

/// Reads stdout and stderr concurrently until both close, then reaps the child.
async fn drain(
    mut child: Child,
    stdout: impl AsyncRead + Unpin,
    stderr: impl AsyncRead + Unpin,
    mut sink: Option<LineSink<'_>>,
    program: &str,
) -> Result<Execution> {
    let stream_error = |source: std::io::Error| BackupError::Stream {
        program: program.to_string(),
        source,
    };

    let mut out_lines = BufReader::new(stdout).split(b'\n');
    let mut err_lines = BufReader::new(stderr).split(b'\n');
    let (mut out_open, mut err_open) = (true, true);
    let mut execution = Execution::default();

    while out_open || err_open {
        tokio::select! {
            segment = out_lines.next_segment(), if out_open => {
                match segment.map_err(stream_error)? {
                    Some(bytes) => {
                        let line = decode(&bytes);
                        execution.summary.observe(&line);
                        if let Some(sink) = sink.as_mut() {
                            sink(&line);
                        }
                    }
                    None => out_open = false,
                }
            }
            segment = err_lines.next_segment(), if err_open => {
                match segment.map_err(stream_error)? {
                    Some(bytes) => {
                        let line = decode(&bytes);
                        warn!("{} stderr: {}", program, line);
                        if execution.errors.len() == MAX_ERROR_LINES {
                            execution.errors.remove(0);
                        }
                        execution.errors.push(line);
                    }
                    None => err_open = false,
                }
            }
        }
    }

    let status = child.wait().await.map_err(stream_error)?;
    execution.exit_code = status.code();
    execution.success = status.success();
    Ok(execution)
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\r')
        .to_string()
}

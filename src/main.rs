use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::process::ExitCode;
use tracing::info;

mod backup;
mod cli;
mod error;
mod utils;

use crate::backup::{
    AutoConfirm, Confirm, Orchestrator, PathResolver, RsyncExecutor, RunResult, StdinConfirm,
};
use crate::cli::Cli;
use crate::utils::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let json = cli.json;

    match run(cli).await {
        Ok(code) => ExitCode::from(clamp(code)),
        Err(e) => {
            let notice = backup::report::aborted(&format!("{e:#}"));
            if json {
                eprintln!("\n{notice}");
            } else {
                println!("\n{notice}");
            }
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    dotenvy::dotenv().ok();

    let config = Config::load(cli.config.as_deref(), cli.overrides())
        .context("could not load configuration")?;
    utils::logging::init_tracing(config.verbose, cli.log_format)?;

    info!("Starting backup-mirror v{}", env!("CARGO_PKG_VERSION"));

    let resolver = PathResolver::from_env()?;
    let runner = RsyncExecutor::new(config.timeout);
    let confirm: Box<dyn Confirm> = if config.interactive {
        Box::new(StdinConfirm::new(cli.json))
    } else {
        Box::new(AutoConfirm)
    };

    // With --json, stdout carries only the result document.
    let mut orchestrator = Orchestrator::new(&config, resolver, &runner, confirm.as_ref());
    if cli.json {
        orchestrator = orchestrator.with_console(Box::new(std::io::stderr()));
    }
    let result = orchestrator.run().await;

    let (mut stdout, mut stderr) = (std::io::stdout(), std::io::stderr());
    if cli.json {
        finish(&result, true, &mut stderr, &mut stdout)?;
    } else {
        finish(&result, false, &mut stdout, &mut stderr)?;
    }
    Ok(result.exit_code())
}

/// The one place a run's abort notice is printed. With `json`, `machine` gets the
/// result document and nothing else.
fn finish(
    result: &RunResult,
    json: bool,
    human: &mut dyn Write,
    machine: &mut dyn Write,
) -> Result<()> {
    if let Some(reason) = result.abort_reason() {
        writeln!(human)?;
        writeln!(human, "{}", backup::report::aborted(reason))?;
    }
    if json {
        writeln!(machine, "{}", serde_json::to_string_pretty(result)?)?;
    }
    Ok(())
}

fn clamp(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::RunOutcome;

    #[test]
    fn test_json_output_is_only_the_document() {
        let mut result = RunResult::new();
        result.outcome = RunOutcome::PreconditionFailed {
            reason: "No backup destination!".into(),
        };
        let (mut human, mut machine) = (Vec::new(), Vec::new());

        finish(&result, true, &mut human, &mut machine).unwrap();

        let doc: serde_json::Value = serde_json::from_slice(&machine).unwrap();
        assert_eq!(doc["outcome"]["status"], "precondition_failed");
        assert!(String::from_utf8(human).unwrap().contains("Backup aborted! No backup destination!"));
    }

    #[test]
    fn test_plain_output_has_no_document() {
        let result = RunResult::new();
        let (mut human, mut machine) = (Vec::new(), Vec::new());

        finish(&result, false, &mut human, &mut machine).unwrap();

        assert!(human.is_empty());
        assert!(machine.is_empty());
    }

    #[test]
    fn test_exit_code_clamp() {
        assert_eq!(clamp(23), 23);
        assert_eq!(clamp(-1), 1);
        assert_eq!(clamp(300), 1);
    }
}

use std::io::{self, BufRead, Write};
use tracing::warn;

/// Yes/no gate before the real transfer starts.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Empty input or a case-insensitive `y` is a yes; anything else declines.
pub fn is_affirmative(response: &str) -> bool {
    let response = response.trim();
    response.is_empty() || response.eq_ignore_ascii_case("y")
}

/// Prompts on stdout (or stderr, when stdout carries machine output) and reads
/// one line from stdin.
pub struct StdinConfirm {
    prompt_on_stderr: bool,
}

impl StdinConfirm {
    pub fn new(prompt_on_stderr: bool) -> Self {
        Self { prompt_on_stderr }
    }
}

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        let mut out: Box<dyn Write> = if self.prompt_on_stderr {
            Box::new(io::stderr().lock())
        } else {
            Box::new(io::stdout().lock())
        };
        if write!(out, "{prompt} <y>/n: ").and_then(|_| out.flush()).is_err() {
            return false;
        }
        drop(out);

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            // EOF: nobody is there to say yes.
            Ok(0) => false,
            Ok(_) => is_affirmative(&line),
            Err(e) => {
                warn!("Could not read confirmation: {}", e);
                false
            }
        }
    }
}

/// Non-interactive runs: always proceed.
pub struct AutoConfirm;

impl Confirm for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

use super::exclude::exclusion_args;
use super::flags::{FlagSet, VERBOSE_FLAGS};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;

const NICE_PROGRAM: &str = "nice";
const NICE_LEVEL: &str = "19";

/// A fully assembled rsync call. Built once, only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    program: PathBuf,
    options: Vec<String>,
    sources: Vec<PathBuf>,
    destination: PathBuf,
    low_priority: bool,
}

impl ToolInvocation {
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Arguments after the program: options, then sources, then the destination.
    pub fn argv(&self) -> Vec<OsString> {
        self.options
            .iter()
            .map(OsString::from)
            .chain(self.sources.iter().map(|s| s.clone().into_os_string()))
            .chain(std::iter::once(self.destination.clone().into_os_string()))
            .collect()
    }

    /// Ready-to-spawn process; arguments are passed directly, never through a shell.
    pub fn to_command(&self) -> Command {
        let mut cmd = if self.low_priority {
            let mut nice = Command::new(NICE_PROGRAM);
            nice.arg("-n").arg(NICE_LEVEL).arg(&self.program);
            nice
        } else {
            Command::new(&self.program)
        };
        cmd.args(self.argv());
        cmd
    }

    /// Shell-quoted rendering for display, copy-pasteable into a POSIX shell.
    pub fn preview(&self) -> String {
        let mut words = Vec::new();
        if self.low_priority {
            words.push(format!("{NICE_PROGRAM} -n {NICE_LEVEL}"));
        }
        words.push(shell_quote(&self.program.to_string_lossy()));
        words.extend(self.argv().iter().map(|a| shell_quote(&a.to_string_lossy())));
        words.join(" ")
    }
}

fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=+:,@%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Composes a [`ToolInvocation`] from its parts.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: PathBuf,
    flags: FlagSet,
    verbose: bool,
    excludes: Vec<String>,
    low_priority: bool,
}

impl CommandBuilder {
    pub fn new(program: impl Into<PathBuf>, flags: FlagSet) -> Self {
        Self {
            program: program.into(),
            flags,
            verbose: false,
            excludes: Vec::new(),
            low_priority: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn excludes(mut self, patterns: &[String]) -> Self {
        self.excludes = patterns.to_vec();
        self
    }

    pub fn low_priority(mut self, low_priority: bool) -> Self {
        self.low_priority = low_priority;
        self
    }

    pub fn build(&self, sources: &[PathBuf], destination: &Path) -> ToolInvocation {
        let mut options: Vec<String> = self.flags.as_slice().to_vec();
        if self.verbose {
            options.extend(VERBOSE_FLAGS.iter().map(|f| f.to_string()));
        }
        options.extend(exclusion_args(&self.excludes));

        ToolInvocation {
            program: self.program.clone(),
            options,
            sources: sources.to_vec(),
            destination: destination.to_path_buf(),
            low_priority: self.low_priority,
        }
    }
}

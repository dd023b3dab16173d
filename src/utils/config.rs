use crate::backup::rsync::DEFAULT_RSYNC_PATH;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "BACKUP_MIRROR";
const LIST_KEYS: &[&str] = &["sources", "destinations", "excludes"];

/// Settings for one run. Built once at startup and never changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Progress/human-readable rsync flags and live output forwarding
    pub verbose: bool,

    /// Files and folders to back up, in order
    pub sources: Vec<String>,

    /// Destination candidates; the first accessible one is used
    pub destinations: Vec<String>,

    /// Extra exclude patterns, applied after the built-in ones
    pub excludes: Vec<String>,

    /// Print the resolved sources before running
    pub show_backup_list: bool,

    /// Print sources that were skipped as inaccessible
    pub show_inaccessible: bool,

    /// Ask before starting the real transfer
    pub interactive: bool,

    /// Well-known rsync location, PATH is searched if it is missing
    pub rsync_path: PathBuf,

    /// The probe copy must be newer than now minus this
    pub freshness_tolerance: Duration,

    /// Upper bound for the real transfer (none = wait forever)
    pub timeout: Option<Duration>,

    /// Run the real transfer under `nice -n 19`
    pub low_priority: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: false,
            sources: Vec::new(),
            destinations: Vec::new(),
            excludes: Vec::new(),
            show_backup_list: false,
            show_inaccessible: true,
            interactive: true,
            rsync_path: PathBuf::from(DEFAULT_RSYNC_PATH),
            freshness_tolerance: Duration::from_secs(3),
            timeout: None,
            low_priority: false,
        }
    }
}

/// One source of settings (file, environment or command line); unset fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub verbose: Option<bool>,
    pub sources: Option<Vec<String>>,
    pub destinations: Option<Vec<String>>,
    pub excludes: Option<Vec<String>>,
    pub show_backup_list: Option<bool>,
    pub show_inaccessible: Option<bool>,
    pub interactive: Option<bool>,
    pub rsync_path: Option<PathBuf>,
    pub freshness_tolerance: Option<String>,
    pub timeout: Option<String>,
    pub low_priority: Option<bool>,
}

impl Config {
    /// Defaults, then the config file, then `BACKUP_MIRROR_*` variables, then `overrides`.
    pub fn load(path: Option<&Path>, overrides: ConfigLayer) -> Result<Self> {
        let (file, explicit) = match path {
            Some(p) => (Some(p.to_path_buf()), true),
            None => (default_config_path(), false),
        };
        let layer = layered(file.as_deref(), explicit, Some(ENV_PREFIX))?;

        let mut config = Config::default();
        config.apply(layer)?;
        config.apply(overrides)?;
        Ok(config)
    }

    fn apply(&mut self, layer: ConfigLayer) -> Result<()> {
        if let Some(v) = layer.verbose {
            self.verbose = v;
        }
        if let Some(v) = layer.sources {
            self.sources = v;
        }
        if let Some(v) = layer.destinations {
            self.destinations = v;
        }
        if let Some(v) = layer.excludes {
            self.excludes = v;
        }
        if let Some(v) = layer.show_backup_list {
            self.show_backup_list = v;
        }
        if let Some(v) = layer.show_inaccessible {
            self.show_inaccessible = v;
        }
        if let Some(v) = layer.interactive {
            self.interactive = v;
        }
        if let Some(v) = layer.rsync_path {
            self.rsync_path = v;
        }
        if let Some(v) = layer.freshness_tolerance {
            self.freshness_tolerance = humantime::parse_duration(&v)
                .with_context(|| format!("invalid freshness_tolerance {v:?}"))?;
        }
        if let Some(v) = layer.timeout {
            self.timeout = match v.trim() {
                "" | "none" | "0" => None,
                text => Some(
                    humantime::parse_duration(text)
                        .with_context(|| format!("invalid timeout {v:?}"))?,
                ),
            };
        }
        if let Some(v) = layer.low_priority {
            self.low_priority = v;
        }
        Ok(())
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("backup-mirror").join("config.toml"))
}

fn layered(file: Option<&Path>, required: bool, env_prefix: Option<&str>) -> Result<ConfigLayer> {
    let mut builder = config::Config::builder();

    if let Some(path) = file {
        builder = builder.add_source(config::File::from(path).required(required));
    }

    if let Some(prefix) = env_prefix {
        let mut env = config::Environment::with_prefix(prefix)
            .try_parsing(true)
            .list_separator(",");
        for key in LIST_KEYS {
            env = env.with_list_parse_key(key);
        }
        builder = builder.add_source(env);
    }

    builder
        .build()
        .context("failed to read configuration")?
        .try_deserialize()
        .context("failed to parse configuration")
}

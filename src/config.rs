//! Server configuration
//!
//! Settings come from three layers, highest priority first: command line
//! flags, an optional JSON config file, and built-in defaults.

use clap::Parser;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default port to listen on
pub const DEFAULT_PORT: u16 = 3001;

/// Errors loading the config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Command line arguments
#[derive(Debug, Default, Parser)]
#[command(name = "chameleon")]
#[command(about = "Game server for The Chameleon party game")]
pub struct Cli {
    /// JSON config file (defaults to the OS config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to
    #[arg(short, long)]
    pub bind: Option<IpAddr>,

    /// Port to listen on; the next free port is used if it is taken
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Delay before the vote result is revealed, in milliseconds
    #[arg(long)]
    pub vote_reveal_delay_ms: Option<u64>,

    /// Advertise the server on the local network over mDNS
    #[arg(long)]
    pub advertise: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long)]
    pub log_filter: Option<String>,
}

/// Effective server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address to bind to
    pub bind: IpAddr,
    /// First port to try
    pub port: u16,
    /// How many ports above `port` to try when it is taken
    pub port_range: u16,
    /// Delay between the final vote and the vote result broadcast
    pub vote_reveal_delay_ms: u64,
    /// Advertise over mDNS
    pub advertise: bool,
    /// `tracing` filter directive
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            port_range: 100,
            vote_reveal_delay_ms: 1000,
            advertise: false,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Build the effective config for `cli`.
    ///
    /// An explicit `--config` path must exist. The default path is only
    /// read if a file is there.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let base = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        Ok(base.merge(cli))
    }

    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `<OS config dir>/config.json`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "chameleon").map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Apply command line overrides
    fn merge(mut self, cli: &Cli) -> Self {
        if let Some(bind) = cli.bind {
            self.bind = bind;
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(delay) = cli.vote_reveal_delay_ms {
            self.vote_reveal_delay_ms = delay;
        }
        if cli.advertise {
            self.advertise = true;
        }
        if let Some(filter) = &cli.log_filter {
            self.log_filter = filter.clone();
        }
        self
    }

    pub fn vote_reveal_delay(&self) -> Duration {
        Duration::from_millis(self.vote_reveal_delay_ms)
    }
}

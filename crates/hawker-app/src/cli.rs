//! Command-line arguments for the `hawker` binary.
//!
//! Every flag is optional; anything not given falls through to the
//! `HAWKER_*` environment, then the config file, then built-in defaults.

use clap::Parser;
use std::path::PathBuf;

/// Hawker - a Vietnamese conversational commerce engine for phone retail.
#[derive(Parser, Debug)]
#[command(name = "hawker", version, about)]
pub struct CliArgs {
    /// Configuration file (default: ~/.hawker/config.toml).
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Port for the API server.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Directory holding the session database and product catalog.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Config file location: `--config`, else `HAWKER_CONFIG`, else the
    /// per-user default.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .or_else(|| std::env::var("HAWKER_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(default_config_path)
    }

    /// Server port: `--port`, else `HAWKER_PORT`, else the config value
    /// (0 in the file means "unset" and falls back to 8080).
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        let from_env = || std::env::var("HAWKER_PORT").ok()?.parse().ok();
        self.port
            .or_else(from_env)
            .or(if config_port != 0 { Some(config_port) } else { None })
            .unwrap_or(8080)
    }

    /// Data directory override from `--data-dir`, if given.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Log level override from `--log-level`, if given. `RUST_LOG` and the
    /// config file are consulted by the caller when this is `None`.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    let home = std::env::var("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var("HOME");

    match home {
        Ok(home) => PathBuf::from(home).join(".hawker").join("config.toml"),
        Err(_) => PathBuf::from("config.toml"),
    }
}

//! Command line arguments
//!
//! Everything else lives in the TOML file; the flags here locate that file
//! and override its `[log]` section.

use crate::core::config::Config;
use clap::{ArgAction, Parser};
use std::io::IsTerminal;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "queuehook")]
#[command(about = "Deliver message queue traffic to HTTP and JSON-RPC callbacks")]
#[command(version)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Force colored log output
    #[arg(long = "color", action = ArgAction::SetTrue)]
    pub color: bool,

    /// Disable colored log output
    #[arg(long = "no-color", action = ArgAction::SetTrue, conflicts_with = "color")]
    pub no_color: bool,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Load and validate the configuration, then exit
    #[arg(long = "check", action = ArgAction::SetTrue)]
    pub check: bool,
}

impl Args {
    /// Command line values win over the file
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log.format = format.clone();
        }
        if let Some(file) = &self.log_file {
            config.log.file = Some(file.display().to_string());
        }
    }

    pub fn use_color(&self) -> bool {
        if self.no_color {
            return false;
        }
        self.color || std::io::stderr().is_terminal()
    }
}

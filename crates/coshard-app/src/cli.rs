//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::logging::LoggingConfig;

#[derive(Debug, Parser)]
#[command(name = "coshard", version, about = "MySQL sharding proxy")]
pub struct Cli {
    /// Directory holding cs.toml, datanode.json, schema.json and user.json
    #[arg(short, long, env = "COSHARD_CONFIG_DIR", default_value = "etc")]
    pub config_dir: PathBuf,

    /// Listen address, overriding `addr` from cs.toml
    #[arg(long)]
    pub addr: Option<String>,

    /// Logging preset
    #[arg(long, value_enum, default_value_t = LogProfile::Production)]
    pub log_profile: LogProfile,

    /// Directory for JSON log files
    #[arg(long, env = "COSHARD_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log to the console only
    #[arg(long)]
    pub no_file_log: bool,

    /// Load and validate the configuration, then exit
    #[arg(long)]
    pub check: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogProfile {
    Development,
    Production,
}

impl Cli {
    pub fn logging_config(&self) -> LoggingConfig {
        let mut config = match self.log_profile {
            LogProfile::Development => LoggingConfig::development(),
            LogProfile::Production => LoggingConfig::production(),
        };
        if let Some(dir) = &self.log_dir {
            config.log_dir = dir.clone();
        }
        if self.no_file_log {
            config.enable_json_logs = false;
        }
        config
    }
}

//! Config directory loading

use coshard_core::{CoshardError, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::{CoShardConfig, DataNodeConfig, SchemaConfig, UserConfig};

pub const MAIN_CONFIG_FILE: &str = "cs.toml";
pub const DATANODE_FILE: &str = "datanode.json";
pub const SCHEMA_FILE: &str = "schema.json";
pub const USER_FILE: &str = "user.json";

/// Load and validate the full configuration from `dir`
#[tracing::instrument(skip_all, fields(dir = %dir.display()))]
pub fn load_from_dir(dir: &Path) -> Result<CoShardConfig> {
    tracing::debug!("loading configuration");

    let mut config = parse_main_config(&dir.join(MAIN_CONFIG_FILE))?;
    config.nodes = parse_data_nodes(&dir.join(DATANODE_FILE))?;
    config.schemas = parse_schemas(&dir.join(SCHEMA_FILE))?;
    config.users = parse_users(&dir.join(USER_FILE))?;

    crate::validate(&config)?;

    tracing::info!(
        addr = %config.addr,
        nodes = config.nodes.len(),
        schemas = config.schemas.len(),
        users = config.users.len(),
        "configuration loaded"
    );
    Ok(config)
}

/// Parse the TOML main config (listen address and pool settings)
pub fn parse_main_config(path: &Path) -> Result<CoShardConfig> {
    let content = read(path)?;
    toml::from_str(&content).map_err(|e| {
        CoshardError::Configuration(format!("Invalid {}: {}", path.display(), e))
    })
}

pub fn parse_data_nodes(path: &Path) -> Result<Vec<DataNodeConfig>> {
    parse_json(path)
}

pub fn parse_schemas(path: &Path) -> Result<Vec<SchemaConfig>> {
    parse_json(path)
}

pub fn parse_users(path: &Path) -> Result<Vec<UserConfig>> {
    parse_json(path)
}

fn parse_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read(path)?;
    serde_json::from_str(&content).map_err(|e| {
        CoshardError::Configuration(format!("Invalid {}: {}", path.display(), e))
    })
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        CoshardError::Configuration(format!("Failed to read {}: {}", path.display(), e))
    })
}

//! Startup validation

use coshard_core::{CoshardError, Result};
use std::collections::HashSet;

use crate::CoShardConfig;

/// Check cross references and bounds; every failure is fatal at startup.
pub fn validate(config: &CoShardConfig) -> Result<()> {
    if config.addr.trim().is_empty() {
        return Err(CoshardError::Configuration("addr must not be empty".into()));
    }

    let mut pooled_nodes = HashSet::new();
    let mut seen = HashSet::new();
    for node in &config.nodes {
        if !seen.insert(node.name.as_str()) {
            return Err(CoshardError::Configuration(format!(
                "datanode: {} is defined more than once",
                node.name
            )));
        }
        if node.max_connection < 1 {
            return Err(CoshardError::Configuration(format!(
                "datanode: {} max_connection must be at least 1",
                node.name
            )));
        }
        if node.min_connection > node.max_connection {
            return Err(CoshardError::Configuration(format!(
                "datanode: {} min_connection ({}) cannot exceed max_connection ({})",
                node.name, node.min_connection, node.max_connection
            )));
        }
        if node.write_servers().next().is_some() {
            pooled_nodes.insert(node.name.as_str());
        }
    }

    let mut users = HashSet::new();
    for user in &config.users {
        if !users.insert(user.user.as_str()) {
            return Err(CoshardError::Configuration(format!(
                "user: {} is defined more than once",
                user.user
            )));
        }
    }

    for schema in &config.schemas {
        for shard in &schema.shards {
            if !pooled_nodes.contains(shard.datanode.as_str()) {
                return Err(CoshardError::Configuration(format!(
                    "shard: {} of schema {} references datanode {} which has no read-write server",
                    shard.name, schema.name, shard.datanode
                )));
            }
        }

        let rules: HashSet<&str> = schema.rules.iter().map(|r| r.name.as_str()).collect();
        for table in &schema.tables {
            if !rules.contains(table.rule_name.as_str()) {
                return Err(CoshardError::Configuration(format!(
                    "rule: {} doesn't exist",
                    table.rule_name
                )));
            }
        }
    }

    Ok(())
}

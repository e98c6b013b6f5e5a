//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level proxy configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoShardConfig {
    /// Address the frontend listens on, e.g. `0.0.0.0:3307`
    pub addr: String,

    #[serde(default)]
    pub pool: PoolSettings,

    #[serde(skip)]
    pub schemas: Vec<SchemaConfig>,
    #[serde(skip)]
    pub nodes: Vec<DataNodeConfig>,
    #[serde(skip)]
    pub users: Vec<UserConfig>,
}

/// Frontend user credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub user: String,
    pub password: String,
}

/// Pool tuning shared by every data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Idle time after which a connection above the warm floor is evicted
    pub idle_timeout_ms: u64,
    /// Period of the idle reaper
    pub reap_interval_ms: u64,
    /// Acquire deadline while the pool is exhausted; 0 waits forever
    pub acquire_timeout_ms: u64,
    /// Health-check idle connections before handing them out
    pub test_on_acquire: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 60_000,
            reap_interval_ms: 60_000,
            acquire_timeout_ms: 30_000,
            test_on_acquire: false,
        }
    }
}

impl PoolSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }

    /// `None` when acquire should wait without a deadline
    pub fn acquire_timeout(&self) -> Option<Duration> {
        (self.acquire_timeout_ms > 0).then(|| Duration::from_millis(self.acquire_timeout_ms))
    }
}

/// Role of a data node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Holds unsharded tables
    #[default]
    Default,
    /// Holds one split of sharded tables
    Split,
}

/// A backend data node: one set of storage instances (e.g. a primary and its replicas)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataNodeConfig {
    pub name: String,
    #[serde(default)]
    pub min_connection: usize,
    pub max_connection: usize,
    pub user: String,
    pub password: String,
    #[serde(rename = "type", default)]
    pub kind: NodeType,
    #[serde(rename = "dataServers", default)]
    pub data_servers: Vec<DataServerConfig>,
}

impl DataNodeConfig {
    /// Data servers that accept writes; only these are pooled
    pub fn write_servers(&self) -> impl Iterator<Item = &DataServerConfig> {
        self.data_servers
            .iter()
            .filter(|server| server.kind == DataServerType::Normal)
    }
}

/// Role of a storage instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataServerType {
    /// Read-write instance
    Normal,
    /// Read-only instance
    Read,
}

/// One storage instance of a data node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataServerConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DataServerType,
    pub ip: String,
    pub port: u16,
}

impl DataServerConfig {
    /// `ip:port` of the instance
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// A logical schema exposed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub name: String,
    #[serde(default)]
    pub charset: String,
    #[serde(default)]
    pub shards: Vec<ShardConfig>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

/// Role of a shard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardType {
    /// Receives rows no rule maps elsewhere
    Default,
    #[default]
    Split,
}

/// A physical database on a data node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig {
    pub name: String,
    pub index: usize,
    pub datanode: String,
    pub database: String,
    #[serde(rename = "type", default)]
    pub kind: ShardType,
}

/// Sharding algorithm selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    List,
    Hash,
}

/// A named sharding rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    pub algorithm: Algorithm,
    /// Algorithm-specific properties
    #[serde(default)]
    pub props: serde_json::Map<String, serde_json::Value>,
}

/// Distribution of a table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableType {
    /// Rows spread across shards by rule
    #[default]
    Split,
    /// Broadcast to every shard
    Global,
    /// Co-located with a parent table
    Child,
}

/// Primary key generation strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PkIncrType {
    #[default]
    None,
    /// Database auto-increment with a per-shard step
    Sequence,
    /// Timestamp based
    Time,
}

/// A table exposed by a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: TableType,
    #[serde(default)]
    pub shard_count: usize,
    #[serde(default)]
    pub shard_key: String,
    pub rule_name: String,
    #[serde(default)]
    pub primary_key: String,
    #[serde(default)]
    pub pk_incr_type: PkIncrType,
}

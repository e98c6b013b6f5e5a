//! Registry of data-node pools

use std::collections::HashMap;
use std::sync::Arc;

use coshard_config::{DataNodeConfig, PoolSettings};
use coshard_core::{ConnectionFactory, CoshardError, Endpoint, Result};

use crate::config::PoolConfig;
use crate::pool::DataSource;
use crate::pooled::PooledConnection;

/// Pools for one data node, one per read-write data server
#[derive(Debug)]
pub struct DbPool {
    name: String,
    write_sources: Vec<DataSource>,
}

impl DbPool {
    /// Open a pool for every read-write server of the node
    #[tracing::instrument(skip_all, fields(node = %node.name))]
    pub async fn connect(
        node: &DataNodeConfig,
        settings: &PoolSettings,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<Self> {
        let config = PoolConfig::from_settings(node.min_connection, node.max_connection, settings);

        let mut write_sources = Vec::new();
        for server in node.write_servers() {
            let endpoint = Endpoint::new(server.address(), &node.user, &node.password);
            match DataSource::connect(endpoint, config.clone(), factory.clone()).await {
                Ok(source) => write_sources.push(source),
                Err(e) => {
                    for source in &write_sources {
                        source.close().await;
                    }
                    return Err(e);
                }
            }
        }

        if write_sources.is_empty() {
            return Err(CoshardError::Configuration(format!(
                "datanode: {} has no read-write data server",
                node.name
            )));
        }

        Ok(Self {
            name: node.name.clone(),
            write_sources,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn write_sources(&self) -> &[DataSource] {
        &self.write_sources
    }

    /// The first read-write source
    pub fn primary(&self) -> &DataSource {
        // Construction guarantees at least one write source.
        &self.write_sources[0]
    }

    /// Acquire a connection from the primary source
    pub async fn acquire(&self) -> Result<PooledConnection> {
        self.primary().acquire().await
    }

    pub async fn close(&self) {
        for source in &self.write_sources {
            source.close().await;
        }
    }
}

/// Data-node pools keyed by node name, built once at startup
#[derive(Debug, Default)]
pub struct PoolRegistry {
    pools: HashMap<String, Arc<DbPool>>,
}

impl PoolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build pools for every configured node that can serve writes.
    ///
    /// On failure, pools already opened are closed before returning the error.
    pub async fn from_config(
        nodes: &[DataNodeConfig],
        settings: &PoolSettings,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for node in nodes {
            if node.write_servers().next().is_none() {
                tracing::warn!(node = %node.name, "skipping data node without a read-write server");
                continue;
            }
            match DbPool::connect(node, settings, factory.clone()).await {
                Ok(pool) => registry.insert(pool),
                Err(e) => {
                    registry.close_all().await;
                    return Err(e);
                }
            }
        }
        tracing::info!(pools = registry.len(), "pool registry ready");
        Ok(registry)
    }

    /// Register a node pool, replacing any pool with the same name
    pub fn insert(&mut self, pool: DbPool) {
        tracing::debug!(node = %pool.name(), "registering data node pool");
        self.pools.insert(pool.name().to_string(), Arc::new(pool));
    }

    /// Get a node pool by name
    pub fn get(&self, name: &str) -> Result<Arc<DbPool>> {
        self.pools
            .get(name)
            .cloned()
            .ok_or_else(|| CoshardError::NotFound(format!("datanode: {}", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pools.contains_key(name)
    }

    /// List all registered node names
    pub fn names(&self) -> Vec<&str> {
        self.pools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Close every pool in the registry
    pub async fn close_all(&self) {
        for pool in self.pools.values() {
            pool.close().await;
        }
    }
}

//! Listener, shared server state and the accept loop

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use coshard_config::CoShardConfig;
use coshard_core::{ConnectionFactory, CoshardError, Result};
use coshard_pool::{PoolRegistry, PooledConnection};
use coshard_router::{Schema, Shard};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::client::ClientConn;


/// Connection ids handed to clients start after this value
const BASE_CONNECTION_ID: u32 = 10_000;

/// Users, schemas and backend pools shared by every client session
#[derive(Debug)]
pub struct ServerState {
    users: HashMap<String, String>,
    schemas: HashMap<String, Schema>,
    pools: Arc<PoolRegistry>,
}

impl ServerState {
    pub fn new(
        users: HashMap<String, String>,
        schemas: HashMap<String, Schema>,
        pools: Arc<PoolRegistry>,
    ) -> Self {
        Self {
            users,
            schemas,
            pools,
        }
    }

    /// Build schemas and open the backend pools.
    ///
    /// Every data node a shard points at must end up with a pool; otherwise
    /// the pools opened so far are closed and a configuration error returned.
    pub async fn from_config(
        config: &CoShardConfig,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<Self> {
        let users = config
            .users
            .iter()
            .map(|u| (u.user.clone(), u.password.clone()))
            .collect();

        let schemas = config
            .schemas
            .iter()
            .map(|s| -> Result<(String, Schema)> { Ok((s.name.clone(), Schema::from_config(s)?)) })
            .collect::<Result<HashMap<_, _>>>()?;

        let pools = PoolRegistry::from_config(&config.nodes, &config.pool, factory).await?;

        let missing = schemas.values().find_map(|schema| {
            schema
                .datanodes()
                .find(|node| !pools.contains(node))
                .map(|node| (schema.name().to_string(), node.to_string()))
        });
        if let Some((schema, node)) = missing {
            pools.close_all().await;
            return Err(CoshardError::Configuration(format!(
                "datanode: {} used by schema {} has no read-write pool",
                node, schema
            )));
        }

        Ok(Self::new(users, schemas, Arc::new(pools)))
    }

    pub fn password(&self, user: &str) -> Option<&str> {
        self.users.get(user).map(String::as_str)
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    pub fn pools(&self) -> &Arc<PoolRegistry> {
        &self.pools
    }

    /// Route `key` of `table` to its shard and borrow a connection to the
    /// shard's data node
    pub async fn backend(
        &self,
        schema: &str,
        table: &str,
        key: &str,
    ) -> Result<(Shard, PooledConnection)> {
        let schema = self
            .schema(schema)
            .ok_or_else(|| CoshardError::NotFound(format!("schema: {}", schema)))?;
        let shard = schema.route(table, key)?.clone();
        let pool = self.pools.get(&shard.datanode)?;
        let conn = pool.acquire().await?;
        Ok((shard, conn))
    }
}

/// The proxy's client-facing listener
pub struct Server {
    state: Arc<ServerState>,
    listener: TcpListener,
    shutdown: CancellationToken,
    next_connection_id: AtomicU32,
}

impl Server {
    /// Build state from the configuration and bind the listen address
    #[tracing::instrument(skip_all, fields(addr = %config.addr))]
    pub async fn new(config: &CoShardConfig, factory: Arc<dyn ConnectionFactory>) -> Result<Self> {
        let state = ServerState::from_config(config, factory).await?;

        let listener = match TcpListener::bind(&config.addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(error = %e, "failed to bind listen address");
                state.pools().close_all().await;
                return Err(e.into());
            }
        };

        Ok(Self {
            state: Arc::new(state),
            listener,
            shutdown: CancellationToken::new(),
            next_connection_id: AtomicU32::new(BASE_CONNECTION_ID),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Token that stops [`run`](Server::run) when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop accepting clients; `run` then closes every backend pool
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Accept clients until shutdown, one task per client
    pub async fn run(&self) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, "coshard server listening");

        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::debug!(connection_id = id, peer = %peer, "client connected");
                    let conn = ClientConn::new(
                        stream,
                        peer.ip().to_string(),
                        id,
                        self.state.clone(),
                        self.shutdown.child_token(),
                    );
                    tokio::spawn(conn.serve());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to accept client connection");
                }
            }
        }

        self.state.pools().close_all().await;
        tracing::info!("coshard server stopped");
        Ok(())
    }
}

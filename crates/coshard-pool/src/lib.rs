//! Coshard Pool - backend connection pooling
//!
//! Each backend data server gets a [`DataSource`]: a bounded set of live
//! connections with three acquire paths (reuse an idle connection, dial a new
//! one while under `max_size`, or wait for a release) and a background reaper
//! that closes connections idle past the timeout while keeping `min_size`
//! warm. The [`PoolRegistry`] maps data-node names to their pools.
//!
//! # Example
//!
//! ```ignore
//! use coshard_pool::{DataSource, PoolConfig};
//!
//! let config = PoolConfig::new(1, 5).with_idle_timeout_ms(60_000);
//! let pool = DataSource::connect(endpoint, config, factory).await?;
//! let conn = pool.acquire().await?;
//! // Use connection...
//! conn.release();
//! ```

mod config;
mod pool;
mod pooled;
mod reaper;
mod registry;
mod stats;

#[cfg(test)]
mod tests;

pub use config::PoolConfig;
pub use pool::DataSource;
pub use pooled::PooledConnection;
pub use reaper::ReapReport;
pub use registry::{DbPool, PoolRegistry};
pub use stats::PoolStats;

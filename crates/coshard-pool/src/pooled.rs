//! Borrowed connection handle and per-member bookkeeping

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use coshard_core::Connection;
use tokio::time::Instant;

use crate::pool::Shared;

/// Pool bookkeeping for one member connection
pub(crate) struct Member {
    pub(crate) conn: Arc<dyn Connection>,
    /// Set while a caller holds the connection; borrowed members are never idle
    pub(crate) borrowed: bool,
    /// Stamped on release; only meaningful while idle
    pub(crate) last_active_at: Instant,
}

impl Member {
    pub(crate) fn new(conn: Arc<dyn Connection>, borrowed: bool) -> Self {
        Self {
            conn,
            borrowed,
            last_active_at: Instant::now(),
        }
    }
}

/// A connection borrowed from a [`DataSource`](crate::DataSource)
///
/// Call [`release`](PooledConnection::release) when done. A handle that is
/// dropped without an explicit release is returned to its pool as well.
pub struct PooledConnection {
    id: u64,
    connection: Arc<dyn Connection>,
    pool: Arc<Shared>,
    released: bool,
}

impl PooledConnection {
    pub(crate) fn new(id: u64, connection: Arc<dyn Connection>, pool: Arc<Shared>) -> Self {
        Self {
            id,
            connection,
            pool,
            released: false,
        }
    }

    /// Pool-local identifier of the underlying member connection
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the underlying connection as an Arc
    pub fn inner(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Return the connection to its pool
    pub fn release(mut self) {
        self.released = true;
        self.pool.release(self.id, self.connection.clone());
    }

    /// Close the connection and drop it from the pool instead of requeuing it
    pub(crate) async fn discard(mut self) {
        self.released = true;
        self.pool.discard(self.id, self.connection.clone()).await;
    }

    pub(crate) fn belongs_to(&self, pool: &Arc<Shared>) -> bool {
        Arc::ptr_eq(&self.pool, pool)
    }
}

impl Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if !self.released {
            self.pool.release(self.id, self.connection.clone());
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("driver", &self.connection.driver_name())
            .field("pool", &self.pool.label)
            .finish()
    }
}

//! MySQL connection implementation

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use coshard_core::{Connection, CoshardError, Result};
use mysql_async::Conn;
use mysql_async::prelude::Queryable;
use tokio::sync::Mutex;

/// One authenticated connection to a MySQL data server
pub struct MySqlConnection {
    /// Taken on close; `None` afterwards
    conn: Mutex<Option<Conn>>,
    closed: AtomicBool,
}

impl MySqlConnection {
    pub fn new(conn: Conn) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    fn driver_name(&self) -> &str {
        "mysql"
    }

    async fn ping(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| CoshardError::Connection("MySQL connection is closed".into()))?;

        if let Err(e) = conn.ping().await {
            self.closed.store(true, Ordering::SeqCst);
            return Err(CoshardError::Connection(format!("MySQL ping failed: {}", e)));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let Some(conn) = self.conn.lock().await.take() else {
            return Ok(());
        };
        self.closed.store(true, Ordering::SeqCst);

        let id = conn.id();
        tracing::debug!(connection_id = id, "closing MySQL connection");
        conn.disconnect().await.map_err(|e| {
            CoshardError::Connection(format!("Failed to close MySQL connection {}: {}", id, e))
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MySqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConnection")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

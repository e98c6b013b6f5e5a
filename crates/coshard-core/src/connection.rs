//! Backend connection and connection factory traits

use crate::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Address and credentials of one backend data server.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `host:port` of the backend
    pub address: String,
    pub user: String,
    pub password: String,
    /// Default database selected during the handshake, if any
    pub database: Option<String>,
}

impl Endpoint {
    /// Create an endpoint without a default database
    pub fn new(
        address: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            user: user.into(),
            password: password.into(),
            database: None,
        }
    }

    /// Select a default database for connections to this endpoint
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

// Keeps the password out of logs.
impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("address", &self.address)
            .field("user", &self.user)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

/// A live, authenticated backend connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "mysql")
    fn driver_name(&self) -> &str;

    /// Round-trip a no-op command to the backend
    async fn ping(&self) -> Result<()>;

    /// Check whether the connection is usable.
    ///
    /// The default implementation pings unless the connection is already
    /// known to be closed.
    async fn is_healthy(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "backend ping failed");
                false
            }
        }
    }

    /// Close the connection. Calling this more than once is a no-op.
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// Dials a backend and performs the protocol handshake
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Open a new authenticated connection to `endpoint`
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Connection>>;
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Connection>> {
        (**self).connect(endpoint).await
    }
}

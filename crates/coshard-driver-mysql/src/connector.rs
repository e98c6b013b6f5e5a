//! Connection factory for MySQL data servers

use std::sync::Arc;

use async_trait::async_trait;
use coshard_core::{Connection, ConnectionFactory, CoshardError, Endpoint, Result};
use mysql_async::{Conn, Opts, OptsBuilder};

use crate::connection::MySqlConnection;

pub const DEFAULT_PORT: u16 = 3306;

/// Dials MySQL data servers with `mysql_async`
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

impl MySqlConnector {
    pub fn new() -> Self {
        Self
    }

    fn opts(endpoint: &Endpoint) -> Result<Opts> {
        let (host, port) = parse_address(&endpoint.address)?;

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(host)
            .tcp_port(port)
            .user(Some(endpoint.user.as_str()))
            .pass(Some(endpoint.password.as_str()));
        if let Some(db) = &endpoint.database {
            builder = builder.db_name(Some(db.as_str()));
        }
        Ok(builder.into())
    }
}

#[async_trait]
impl ConnectionFactory for MySqlConnector {
    #[tracing::instrument(skip(self, endpoint), fields(address = %endpoint.address, user = %endpoint.user))]
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Connection>> {
        let opts = Self::opts(endpoint)?;

        let conn = Conn::new(opts).await.map_err(|e| {
            tracing::error!(error = %e, "failed to connect to MySQL data server");
            CoshardError::Connection(format!(
                "Failed to connect to MySQL at {}: {}",
                endpoint.address, e
            ))
        })?;

        tracing::debug!(connection_id = conn.id(), "MySQL connection established");
        Ok(Arc::new(MySqlConnection::new(conn)))
    }
}

/// Split `host:port` into its parts. A missing port means 3306; IPv6 hosts
/// must be bracketed (`[::1]:3306`).
pub fn parse_address(address: &str) -> Result<(String, u16)> {
    let invalid = || CoshardError::Configuration(format!("invalid data server address: {}", address));

    let address = address.trim();
    if address.is_empty() {
        return Err(invalid());
    }

    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        let port = match tail.strip_prefix(':') {
            Some(port) => port.parse().map_err(|_| invalid())?,
            None if tail.is_empty() => DEFAULT_PORT,
            None => return Err(invalid()),
        };
        return Ok((host.to_string(), port));
    }

    match address.rsplit_once(':') {
        Some((host, _)) if host.is_empty() || host.contains(':') => Err(invalid()),
        Some((host, port)) => {
            let port = port.parse().map_err(|_| invalid())?;
            Ok((host.to_string(), port))
        }
        None => Ok((address.to_string(), DEFAULT_PORT)),
    }
}

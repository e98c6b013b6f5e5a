//! MySQL backend driver
//!
//! Opens single authenticated `mysql_async` connections for the pool. Pooling
//! itself lives in `coshard-pool`, so no `mysql_async::Pool` is used here.

mod connection;
mod connector;

pub use connection::MySqlConnection;
pub use connector::{DEFAULT_PORT, MySqlConnector, parse_address};

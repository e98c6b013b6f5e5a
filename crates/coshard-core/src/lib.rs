//! Coshard Core - shared abstractions for the sharding proxy
//!
//! This crate provides the types every other coshard crate depends on:
//!
//! - `CoshardError` / `Result` - the error type used across the workspace
//! - `Connection` - a live, authenticated backend connection
//! - `ConnectionFactory` - dials a backend and produces a `Connection`
//! - `Endpoint` - address and credentials of one backend data server

mod connection;
mod error;

pub use connection::*;
pub use error::*;

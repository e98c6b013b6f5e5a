//! Coshard Server - the client-facing MySQL frontend
//!
//! Accepts client sockets, runs the protocol-10 handshake with
//! `mysql_native_password` authentication and serves the command loop.
//! Backend access goes through the [`PoolRegistry`](coshard_pool::PoolRegistry)
//! held by [`ServerState`].

mod client;
pub mod mysql;
mod server;

pub use client::ClientConn;
pub use server::{Server, ServerState};

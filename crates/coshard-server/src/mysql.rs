//! MySQL client/server protocol pieces used by the frontend

pub mod auth;
pub mod consts;
mod error;
mod packet;

pub use error::SqlError;
pub use packet::{PacketIo, put_lenenc_int, read_lenenc_int};

//! Coshard Router - shard selection
//!
//! A [`ShardAlgorithm`] maps a shard-key value to a shard index; a [`Schema`]
//! binds tables to their rules and resolves the index to a configured shard.

mod algorithm;
mod schema;

pub use algorithm::{ShardAlgorithm, ShardByHash, ShardByList, build_algorithm};
pub use schema::{Rule, Schema, Shard, Table};

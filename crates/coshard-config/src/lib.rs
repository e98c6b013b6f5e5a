//! Coshard Config - static proxy configuration
//!
//! Data nodes, schemas and users are read once at startup from a config
//! directory and validated before anything is dialed.

mod loader;
mod model;
mod validate;

pub use loader::{
    DATANODE_FILE, MAIN_CONFIG_FILE, SCHEMA_FILE, USER_FILE, load_from_dir, parse_data_nodes,
    parse_main_config, parse_schemas, parse_users,
};
pub use model::*;
pub use validate::validate;

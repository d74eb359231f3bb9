//! Infrastructure layer - configuration files and request clients.
//!
//! This layer handles filesystem access outside the export tree and the
//! concrete implementations of the request port.

pub mod config;
pub mod replay_client;

pub use config::{config_file_path, ensure_config_exists, load_config, load_config_from_file, save_config};
pub use replay_client::{Exchange, ReplayClient, Reply};

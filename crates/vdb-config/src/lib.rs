//! `.vdbconfig` files.
//!
//! A config file names databases by alias and carries per-protocol
//! settings:
//!
//! ```toml
//! [db.default]
//! url = "mem:scratch"
//!
//! [protocol.mem]
//! batch_workers = 4
//! ```
//!
//! [`find_config`] looks for the file in the working directory and then in
//! each ancestor, using the first one it finds.

pub mod config;
pub mod error;

pub use config::{
    find_config, find_config_from, read_config, Config, DbConfig, CONFIG_FILE_NAME,
    DEFAULT_DB_ALIAS,
};
pub use error::{ConfigError, ConfigResult};

use std::path::PathBuf;

use thiserror::Error;
use vdb_spec::SpecError;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config file in the start directory or any of its ancestors.
    #[error("no .vdbconfig found in {} or its ancestors", .start.display())]
    NotFound { start: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A `[db.<alias>]` url is not a valid database spec.
    #[error("database alias {alias:?}: {source}")]
    InvalidDb {
        alias: String,
        #[source]
        source: SpecError,
    },

    #[error(transparent)]
    Spec(#[from] SpecError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

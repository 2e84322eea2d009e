use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use vdb_datas::Database;
use vdb_spec::{DatabaseSpec, ProtocolRegistry, SpecError, SpecResult};

use crate::error::{ConfigError, ConfigResult};

/// File name searched for by [`find_config`].
pub const CONFIG_FILE_NAME: &str = ".vdbconfig";

/// Alias used when a database is requested by the empty string.
pub const DEFAULT_DB_ALIAS: &str = "default";

/// Parsed contents of a `.vdbconfig` file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Where the config was read from, if it came from a file.
    #[serde(skip)]
    pub file: Option<PathBuf>,
    /// Database aliases.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub db: BTreeMap<String, DbConfig>,
    /// Settings per protocol, interpreted by that protocol's backend.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub protocol: BTreeMap<String, toml::Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    pub url: String,
}

impl Config {
    /// Parse config text. Every database url must be a valid spec.
    pub fn from_toml(text: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(text)?;
        for (alias, db) in &config.db {
            DatabaseSpec::parse(&db.url).map_err(|source| ConfigError::InvalidDb {
                alias: alias.clone(),
                source,
            })?;
        }
        Ok(config)
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string(self)?)
    }

    /// Write this config as `dir/.vdbconfig`, creating `dir` if needed.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> ConfigResult<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(CONFIG_FILE_NAME);
        fs::write(&path, self.to_toml()?)?;
        debug!(path = %path.display(), "config written");
        Ok(path)
    }

    /// Resolve an alias, or parse the argument as a spec if it is not one.
    /// The empty string means [`DEFAULT_DB_ALIAS`].
    pub fn resolve_db(&self, alias_or_spec: &str) -> SpecResult<DatabaseSpec> {
        let key = if alias_or_spec.is_empty() {
            DEFAULT_DB_ALIAS
        } else {
            alias_or_spec
        };
        if let Some(db) = self.db.get(key) {
            return DatabaseSpec::parse(&db.url);
        }
        if alias_or_spec.is_empty() {
            return Err(SpecError::InvalidSpec {
                spec: String::new(),
                reason: format!("no {DEFAULT_DB_ALIAS} database configured"),
            });
        }
        DatabaseSpec::parse(alias_or_spec)
    }

    /// Settings for `protocol`, or an empty table.
    pub fn protocol_config(&self, protocol: &str) -> toml::Value {
        self.protocol
            .get(protocol)
            .cloned()
            .unwrap_or_else(|| toml::Value::Table(toml::Table::new()))
    }

    /// Resolve `alias_or_spec` and open it through `registry` with this
    /// config's settings for its protocol.
    pub fn open_database(
        &self,
        registry: &ProtocolRegistry,
        alias_or_spec: &str,
    ) -> ConfigResult<Database> {
        let spec = self.resolve_db(alias_or_spec)?;
        let settings = self.protocol_config(&spec.protocol);
        Ok(registry.open_database(&spec, &settings)?)
    }
}

/// Read and parse a config file.
pub fn read_config(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let mut config = Config::from_toml(&text)?;
    config.file = Some(fs::canonicalize(path)?);
    Ok(config)
}

/// Find the nearest `.vdbconfig`, starting in `start` and walking up
/// through its ancestors.
pub fn find_config_from(start: impl AsRef<Path>) -> ConfigResult<Config> {
    let start = start.as_ref();
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(CONFIG_FILE_NAME);
        match fs::metadata(&candidate) {
            Ok(meta) if meta.is_file() => {
                debug!(path = %candidate.display(), "config found");
                return read_config(&candidate);
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        dir = current.parent();
    }
    Err(ConfigError::NotFound {
        start: start.to_path_buf(),
    })
}

/// [`find_config_from`] the current working directory.
pub fn find_config() -> ConfigResult<Config> {
    find_config_from(std::env::current_dir()?)
}

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;
use vdb_chunks::{ChunkStore, MemoryStorage, MemoryStoreFactory};
use vdb_datas::Database;

use crate::error::{SpecError, SpecResult};
use crate::spec::{validate_protocol, DatabaseSpec};

/// Protocol of the in-memory backend.
pub const MEM_PROTOCOL: &str = "mem";

/// Builds a store for a spec, given that protocol's configuration table.
pub type StoreConstructor =
    dyn Fn(&DatabaseSpec, &toml::Value) -> SpecResult<Arc<dyn ChunkStore>> + Send + Sync;

/// Maps protocol names to store constructors.
///
/// Registries are plain values: each caller builds the set of backends it
/// wants, and two registries never see each other's registrations.
pub struct ProtocolRegistry {
    constructors: BTreeMap<String, Box<StoreConstructor>>,
}

impl ProtocolRegistry {
    /// A registry with no protocols.
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// A registry with the built-in `mem` protocol.
    ///
    /// Named `mem:<name>` stores opened through the same registry share
    /// durable state; the bare `mem` spec opens a fresh store every time.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let mem = MemoryProtocol::default();
        registry.constructors.insert(
            MEM_PROTOCOL.to_string(),
            Box::new(move |spec: &DatabaseSpec, config: &toml::Value| {
                mem.open(spec, config)
            }),
        );
        registry
    }

    /// Register a constructor for `protocol`. Registering a protocol twice
    /// is an error; [`unregister`](Self::unregister) it first.
    pub fn register<F>(&mut self, protocol: &str, constructor: F) -> SpecResult<()>
    where
        F: Fn(&DatabaseSpec, &toml::Value) -> SpecResult<Arc<dyn ChunkStore>>
            + Send
            + Sync
            + 'static,
    {
        validate_protocol(protocol)?;
        if self.constructors.contains_key(protocol) {
            return Err(SpecError::AlreadyRegistered(protocol.to_string()));
        }
        self.constructors
            .insert(protocol.to_string(), Box::new(constructor));
        debug!(protocol, "protocol registered");
        Ok(())
    }

    /// Remove `protocol`. Returns `false` if it was not registered.
    pub fn unregister(&mut self, protocol: &str) -> bool {
        self.constructors.remove(protocol).is_some()
    }

    pub fn is_registered(&self, protocol: &str) -> bool {
        self.constructors.contains_key(protocol)
    }

    /// Registered protocols, sorted.
    pub fn protocols(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Open a store view for `spec` with the given protocol configuration.
    pub fn open_store(
        &self,
        spec: &DatabaseSpec,
        config: &toml::Value,
    ) -> SpecResult<Arc<dyn ChunkStore>> {
        let constructor = self
            .constructors
            .get(&spec.protocol)
            .ok_or_else(|| SpecError::UnknownProtocol(spec.protocol.clone()))?;
        let store = constructor(spec, config)?;
        debug!(spec = %spec, version = store.version(), "store opened");
        Ok(store)
    }

    /// Open a store and wrap it in a [`Database`], checking its version.
    pub fn open_database(&self, spec: &DatabaseSpec, config: &toml::Value) -> SpecResult<Database> {
        Ok(Database::new(self.open_store(spec, config)?)?)
    }
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("protocols", &self.protocols())
            .finish()
    }
}

/// Settings accepted under `[protocol.mem]`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MemConfig {
    batch_workers: Option<usize>,
}

#[derive(Default)]
struct MemoryProtocol {
    factory: MemoryStoreFactory,
}

impl MemoryProtocol {
    fn open(&self, spec: &DatabaseSpec, config: &toml::Value) -> SpecResult<Arc<dyn ChunkStore>> {
        let config: MemConfig =
            config
                .clone()
                .try_into()
                .map_err(|e: toml::de::Error| SpecError::InvalidProtocolConfig {
                    protocol: MEM_PROTOCOL.to_string(),
                    reason: e.to_string(),
                })?;

        let storage = if spec.is_ephemeral() {
            MemoryStorage::new()
        } else {
            self.factory.storage(&spec.database_name)
        };
        let mut view = storage.new_view();
        if let Some(workers) = config.batch_workers {
            view = view.with_batch_workers(workers);
        }
        Ok(Arc::new(view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdb_chunks::{Chunk, CountingStoreFactory, StoreFactory, FORMAT_VERSION};
    use vdb_types::Hash;

    fn no_config() -> toml::Value {
        toml::Value::Table(toml::Table::new())
    }

    fn spec(s: &str) -> DatabaseSpec {
        DatabaseSpec::parse(s).unwrap()
    }

    #[test]
    fn defaults_register_mem() {
        let registry = ProtocolRegistry::with_defaults();
        assert_eq!(registry.protocols(), vec!["mem"]);
        assert!(registry.is_registered("mem"));
        assert!(ProtocolRegistry::new().protocols().is_empty());
    }

    #[test]
    fn named_mem_stores_share_history() {
        let registry = ProtocolRegistry::with_defaults();
        let a = registry.open_store(&spec("mem:shared"), &no_config()).unwrap();
        let b = registry.open_store(&spec("mem:shared"), &no_config()).unwrap();

        let chunk = Chunk::new(&b"hello"[..]);
        a.put(chunk.clone()).unwrap();
        assert!(a.commit(&chunk.hash(), &Hash::empty()).unwrap());

        b.rebase().unwrap();
        assert_eq!(b.root(), chunk.hash());
        assert!(b.has(&chunk.hash()).unwrap());
    }

    #[test]
    fn bare_mem_stores_are_independent() {
        let registry = ProtocolRegistry::with_defaults();
        let a = registry.open_store(&spec("mem"), &no_config()).unwrap();
        let b = registry.open_store(&spec("mem"), &no_config()).unwrap();

        let chunk = Chunk::new(&b"hello"[..]);
        a.put(chunk.clone()).unwrap();
        assert!(a.commit(&chunk.hash(), &Hash::empty()).unwrap());
        b.rebase().unwrap();
        assert!(b.root().is_empty());
    }

    #[test]
    fn registries_do_not_share_stores() {
        let first = ProtocolRegistry::with_defaults();
        let second = ProtocolRegistry::with_defaults();
        let a = first.open_store(&spec("mem:x"), &no_config()).unwrap();
        let chunk = Chunk::new(&b"x"[..]);
        a.put(chunk.clone()).unwrap();
        assert!(a.commit(&chunk.hash(), &Hash::empty()).unwrap());

        let b = second.open_store(&spec("mem:x"), &no_config()).unwrap();
        assert!(b.root().is_empty());
    }

    #[test]
    fn mem_config_sets_batch_workers() {
        let registry = ProtocolRegistry::with_defaults();
        let config: toml::Value = toml::from_str("batch_workers = 3").unwrap();
        let store = registry.open_store(&spec("mem:w"), &config).unwrap();
        assert_eq!(store.batch_workers(), 3);
    }

    #[test]
    fn mem_config_rejects_unknown_keys() {
        let registry = ProtocolRegistry::with_defaults();
        let config: toml::Value = toml::from_str("cache_size = 3").unwrap();
        let err = registry.open_store(&spec("mem:w"), &config).err().unwrap();
        assert!(matches!(
            err,
            SpecError::InvalidProtocolConfig { ref protocol, .. } if protocol == "mem"
        ));
    }

    #[test]
    fn unknown_protocol_is_an_error() {
        let registry = ProtocolRegistry::with_defaults();
        let err = registry.open_store(&spec("http:example.com"), &no_config()).err().unwrap();
        assert!(matches!(err, SpecError::UnknownProtocol(ref p) if p == "http"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ProtocolRegistry::with_defaults();
        let err = registry
            .register("mem", |_, _| Ok(Arc::new(MemoryStorage::new().new_view())))
            .unwrap_err();
        assert!(matches!(err, SpecError::AlreadyRegistered(ref p) if p == "mem"));

        assert!(registry.unregister("mem"));
        assert!(!registry.unregister("mem"));
        registry
            .register("mem", |_, _| Ok(Arc::new(MemoryStorage::new().new_view())))
            .unwrap();
    }

    #[test]
    fn invalid_protocol_name_is_rejected() {
        let mut registry = ProtocolRegistry::new();
        let err = registry
            .register("Bad Name", |_, _| Ok(Arc::new(MemoryStorage::new().new_view())))
            .unwrap_err();
        assert!(matches!(err, SpecError::InvalidSpec { .. }));
    }

    #[test]
    fn custom_protocol_opens_through_registry() {
        let factory = Arc::new(CountingStoreFactory::new());
        let mut registry = ProtocolRegistry::new();
        let shared = Arc::clone(&factory);
        registry
            .register("count", move |spec, _| {
                Ok(shared.create_store(&spec.database_name))
            })
            .unwrap();

        let db = registry.open_database(&spec("count:ns"), &no_config()).unwrap();
        assert_eq!(db.store().version(), FORMAT_VERSION);
        assert!(db.root().is_empty());
    }
}

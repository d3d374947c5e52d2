//! # Namespace Table
//!
//! Named packet-typing registries keyed by `(key type, name)`.
//!
//! Two endpoints only have to agree on wire keys, not on a shared registry
//! object, so every builder can work from its own [`PacketTyping`]. When a
//! process hosts both ends (or several builders should share one protocol),
//! a registry is created once here and the handle is passed to each builder.
//!
//! [`Namespaces::global`] is a process-wide table for callers that prefer
//! name-based lookup; nothing in the library depends on it.

use rand::distr::Alphabetic;
use rand::Rng;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use tracing::{debug, warn};

use crate::error::constants::{ERR_NAMESPACE_READ_LOCK, ERR_NAMESPACE_WRITE_LOCK};
use crate::error::{ProtocolError, Result};
use crate::protocol::key::PacketKey;
use crate::protocol::typing::PacketTyping;

/// Length of generated anonymous namespace names
pub const ANONYMOUS_NAME_LENGTH: usize = 16;

type Registry = Arc<dyn Any + Send + Sync>;

/// Table of packet-typing registries
#[derive(Default)]
pub struct Namespaces {
    table: RwLock<HashMap<(TypeId, String), Registry>>,
}

static GLOBAL: OnceLock<Namespaces> = OnceLock::new();

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide table
    pub fn global() -> &'static Namespaces {
        GLOBAL.get_or_init(Namespaces::new)
    }

    /// Create a fresh, empty registry under `name`.
    ///
    /// An existing registry with the same key type and name is replaced; holders
    /// of the old handle keep it but it is no longer reachable by lookup.
    pub fn create<K: PacketKey>(&self, name: &str) -> Result<Arc<PacketTyping<K>>> {
        let typing = Arc::new(PacketTyping::<K>::new(name));
        let mut table = self
            .table
            .write()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_NAMESPACE_WRITE_LOCK))?;

        let registry: Registry = typing.clone();
        if table
            .insert((TypeId::of::<K>(), name.to_string()), registry)
            .is_some()
        {
            warn!(namespace = name, key_type = K::TYPE_NAME, "Namespace replaced");
        } else {
            debug!(namespace = name, key_type = K::TYPE_NAME, "Namespace created");
        }
        Ok(typing)
    }

    /// Create a registry under a random alphabetic name
    pub fn create_anonymous<K: PacketKey>(&self) -> Result<Arc<PacketTyping<K>>> {
        self.create(&random_name())
    }

    /// Existing registry for `name` and key type `K`
    pub fn lookup<K: PacketKey>(&self, name: &str) -> Result<Arc<PacketTyping<K>>> {
        let table = self
            .table
            .read()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_NAMESPACE_READ_LOCK))?;

        table
            .get(&(TypeId::of::<K>(), name.to_string()))
            .cloned()
            .and_then(|registry| registry.downcast::<PacketTyping<K>>().ok())
            .ok_or_else(|| ProtocolError::NamespaceNotFound {
                name: name.to_string(),
                key_type: K::TYPE_NAME,
            })
    }

    /// Existing registry for `name`, or a new one if absent
    pub fn get_or_create<K: PacketKey>(&self, name: &str) -> Result<Arc<PacketTyping<K>>> {
        let mut table = self
            .table
            .write()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_NAMESPACE_WRITE_LOCK))?;

        let registry = table
            .entry((TypeId::of::<K>(), name.to_string()))
            .or_insert_with(|| {
                debug!(namespace = name, key_type = K::TYPE_NAME, "Namespace created");
                let registry: Registry = Arc::new(PacketTyping::<K>::new(name));
                registry
            })
            .clone();

        // the key embeds TypeId::of::<K>, so the stored registry is always PacketTyping<K>
        registry
            .downcast::<PacketTyping<K>>()
            .map_err(|_| ProtocolError::NamespaceNotFound {
                name: name.to_string(),
                key_type: K::TYPE_NAME,
            })
    }

    /// Drop a registry from the table; returns whether it existed
    pub fn remove<K: PacketKey>(&self, name: &str) -> Result<bool> {
        let mut table = self
            .table
            .write()
            .map_err(|_| ProtocolError::LockPoisoned(ERR_NAMESPACE_WRITE_LOCK))?;
        Ok(table
            .remove(&(TypeId::of::<K>(), name.to_string()))
            .is_some())
    }

    pub fn len(&self) -> usize {
        self.table.read().map(|table| table.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Random 16-letter namespace name
pub fn random_name() -> String {
    rand::rng()
        .sample_iter(&Alphabetic)
        .take(ANONYMOUS_NAME_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_lookup_returns_created_registry() {
        let namespaces = Namespaces::new();
        let created = namespaces.create::<i32>("demo").unwrap();
        let found = namespaces.lookup::<i32>("demo").unwrap();
        assert!(Arc::ptr_eq(&created, &found));
        assert_eq!(found.name(), "demo");
    }

    #[test]
    fn test_lookup_with_other_key_type_fails() {
        let namespaces = Namespaces::new();
        namespaces.create::<i32>("demo").unwrap();

        match namespaces.lookup::<String>("demo") {
            Err(ProtocolError::NamespaceNotFound { name, key_type }) => {
                assert_eq!(name, "demo");
                assert_eq!(key_type, "String");
            }
            other => panic!("expected NamespaceNotFound, got {other:?}"),
        }
        assert!(namespaces.lookup::<i32>("other").is_err());
    }

    #[test]
    fn test_create_replaces_existing() {
        let namespaces = Namespaces::new();
        let first = namespaces.create::<i32>("demo").unwrap();
        let second = namespaces.create::<i32>("demo").unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&second, &namespaces.lookup::<i32>("demo").unwrap()));
        assert_eq!(namespaces.len(), 1);
    }

    #[test]
    fn test_same_name_different_key_types_coexist() {
        let namespaces = Namespaces::new();
        namespaces.create::<i32>("default").unwrap();
        namespaces.create::<String>("default").unwrap();
        assert_eq!(namespaces.len(), 2);

        assert!(namespaces.remove::<i32>("default").unwrap());
        assert!(!namespaces.remove::<i32>("default").unwrap());
        assert!(namespaces.lookup::<String>("default").is_ok());
    }

    #[test]
    fn test_get_or_create_and_anonymous() {
        let namespaces = Namespaces::new();
        let a = namespaces.get_or_create::<u16>("shared").unwrap();
        let b = namespaces.get_or_create::<u16>("shared").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let anonymous = namespaces.create_anonymous::<i32>().unwrap();
        assert_eq!(anonymous.name().len(), ANONYMOUS_NAME_LENGTH);
        assert!(anonymous.name().chars().all(|c| c.is_ascii_alphabetic()));
    }
}

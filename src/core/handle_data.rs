//! # Handle Data
//!
//! Sender-local scratch space owned by a single packet instance.
//!
//! A packet's `write` step may stash contextual objects here (a handler, a
//! version, a position) that its own `handle` step later reads back. Nothing in
//! this store is ever put on the wire: a receiver decodes into a brand-new
//! instance whose store starts empty.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Label-keyed store of arbitrarily typed values
#[derive(Default)]
pub struct HandleData {
    entries: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl HandleData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under `label`, returning true if an existing entry was replaced
    pub fn insert<T>(&mut self, label: impl Into<String>, value: T) -> bool
    where
        T: Any + Send + Sync,
    {
        self.entries.insert(label.into(), Box::new(value)).is_some()
    }

    /// Typed lookup; `None` if the label is absent or holds a different type
    pub fn get<T: Any>(&self, label: &str) -> Option<&T> {
        self.entries.get(label)?.downcast_ref::<T>()
    }

    pub fn get_mut<T: Any>(&mut self, label: &str) -> Option<&mut T> {
        self.entries.get_mut(label)?.downcast_mut::<T>()
    }

    /// Remove and return a value if it has the requested type.
    ///
    /// An entry of a different type is left in place.
    pub fn remove<T: Any>(&mut self, label: &str) -> Option<T> {
        if !self.entries.get(label)?.is::<T>() {
            return None;
        }
        self.entries
            .remove(label)?
            .downcast::<T>()
            .ok()
            .map(|boxed| *boxed)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Debug for HandleData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleData")
            .field("labels", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct PointLocation {
        x: f64,
        y: f64,
        z: f64,
    }

    #[test]
    fn test_typed_lookup() {
        let mut data = HandleData::new();
        assert!(!data.insert(
            "location",
            PointLocation {
                x: 2.1,
                y: 2.2,
                z: 8.0
            }
        ));

        let location = data.get::<PointLocation>("location");
        assert_eq!(
            location,
            Some(&PointLocation {
                x: 2.1,
                y: 2.2,
                z: 8.0
            })
        );
        assert!(data.get::<String>("location").is_none());
        assert!(data.get::<PointLocation>("missing").is_none());
    }

    #[test]
    fn test_insert_replaces() {
        let mut data = HandleData::new();
        data.insert("version", 1u32);
        assert!(data.insert("version", 2u32));
        assert_eq!(data.get::<u32>("version"), Some(&2));
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_remove_wrong_type_keeps_entry() {
        let mut data = HandleData::new();
        data.insert("name", String::from("alice"));

        assert_eq!(data.remove::<u64>("name"), None);
        assert!(data.contains("name"));

        assert_eq!(data.remove::<String>("name").as_deref(), Some("alice"));
        assert!(data.is_empty());
    }

    #[test]
    fn test_get_mut_and_clear() {
        let mut data = HandleData::new();
        data.insert("counter", 0usize);
        if let Some(counter) = data.get_mut::<usize>("counter") {
            *counter += 5;
        }
        assert_eq!(data.get::<usize>("counter"), Some(&5));

        data.clear();
        assert!(!data.contains("counter"));
    }
}

//! The shared key/value store.
//!
//! Owned exclusively by the broker task; peers reach it through the `!` and
//! `?` protocol commands. Any authenticated peer may read or overwrite any
//! key; that is a documented limitation of the protocol, not an oversight.
//! Entries live until overwritten or process exit.

use std::collections::HashMap;

use mux_protocol::StoreValue;

#[derive(Debug, Default)]
pub struct SharedStore {
    entries: HashMap<String, StoreValue>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite.
    pub fn set(&mut self, key: String, value: StoreValue) {
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&StoreValue> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let mut store = SharedStore::new();
        store.set("motd".to_string(), StoreValue::Str("welcome".to_string()));
        assert_eq!(
            store.get("motd"),
            Some(&StoreValue::Str("welcome".to_string()))
        );
    }

    #[test]
    fn absent_key_is_none() {
        let store = SharedStore::new();
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn set_overwrites() {
        let mut store = SharedStore::new();
        store.set("n".to_string(), StoreValue::Int(1));
        store.set("n".to_string(), StoreValue::Int(2));
        assert_eq!(store.get("n"), Some(&StoreValue::Int(2)));
        assert_eq!(store.len(), 1);
    }
}

//! Named value lookup.
//!
//! Effect templates can take their duration, stack cap or modifier
//! coefficients from named external state instead of constants. The engine
//! reads that state through the `ValueLookup` trait; `ValueTable` is the
//! in-memory implementation. The engine never interprets the keys.

use crate::events::{Observers, SubscriptionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key/value service used to resolve dynamic template parameters.
pub trait ValueLookup {
    /// Current value for `key`. Missing keys read as `0.0`.
    fn get_number(&self, key: &str) -> f64;

    /// Write `value` under `key`.
    fn set_number(&mut self, key: &str, value: f64);
}

/// Change of one table entry. `value` is `None` when the key was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct TableChange {
    pub key: String,
    pub value: Option<f64>,
}

/// In-memory numeric table with per-key observers.
///
/// # Examples
///
/// ```rust
/// use statfx::table::{ValueLookup, ValueTable};
///
/// let mut table = ValueTable::new("caster");
/// table.set_number("burn_duration", 4.0);
/// table.set_bool("enraged", true);
///
/// assert_eq!(table.get_number("burn_duration"), 4.0);
/// assert_eq!(table.get_int("burn_duration"), 4);
/// assert!(table.get_bool("enraged"));
/// assert_eq!(table.get_number("missing"), 0.0);
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ValueTable {
    name: String,
    values: HashMap<String, f64>,
    #[serde(skip)]
    observers: HashMap<String, Observers<TableChange>>,
}

impl ValueTable {
    /// Create an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Load a table from JSON (`{"name": "...", "values": {...}}`).
    pub fn from_json(json: &str) -> Result<Self, crate::StatError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value rounded to the nearest integer.
    pub fn get_int(&self, key: &str) -> i64 {
        self.get_number(key).round() as i64
    }

    /// `true` when the value is greater than zero.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get_number(key) > 0.0
    }

    pub fn set_int(&mut self, key: &str, value: i64) {
        self.set_number(key, value as f64);
    }

    /// Stores `1.0` for `true` and `-1.0` for `false`.
    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set_number(key, if value { 1.0 } else { -1.0 });
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Remove a key, notifying and then dropping its observers.
    pub fn remove(&mut self, key: &str) -> bool {
        if self.values.remove(key).is_none() {
            tracing::debug!(table = %self.name, key, "remove on missing key");
            return false;
        }
        if let Some(mut observers) = self.observers.remove(key) {
            observers.emit(&TableChange {
                key: key.to_string(),
                value: None,
            });
        }
        true
    }

    /// Drop every value and observer.
    pub fn clear(&mut self) {
        self.values.clear();
        self.observers.clear();
    }

    /// Observe writes to `key`.
    pub fn subscribe<F>(&mut self, key: &str, callback: F) -> SubscriptionId
    where
        F: FnMut(&TableChange) + 'static,
    {
        self.observers
            .entry(key.to_string())
            .or_default()
            .subscribe(callback)
    }

    pub fn unsubscribe(&mut self, key: &str, id: SubscriptionId) -> bool {
        self.observers
            .get_mut(key)
            .is_some_and(|observers| observers.unsubscribe(id))
    }
}

impl ValueLookup for ValueTable {
    fn get_number(&self, key: &str) -> f64 {
        match self.values.get(key) {
            Some(value) => *value,
            None => {
                tracing::debug!(table = %self.name, key, "missing key read as 0");
                0.0
            }
        }
    }

    fn set_number(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), value);
        if let Some(observers) = self.observers.get_mut(key) {
            observers.emit(&TableChange {
                key: key.to_string(),
                value: Some(value),
            });
        }
    }
}

impl ValueLookup for HashMap<String, f64> {
    fn get_number(&self, key: &str) -> f64 {
        self.get(key).copied().unwrap_or(0.0)
    }

    fn set_number(&mut self, key: &str, value: f64) {
        self.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_set_get() {
        let mut table = ValueTable::new("t");
        table.set_number("difficulty", 2.6);
        assert_eq!(table.get_number("difficulty"), 2.6);
        assert_eq!(table.get_int("difficulty"), 3);
        assert!(table.contains("difficulty"));
    }

    #[test]
    fn test_bool_encoding() {
        let mut table = ValueTable::new("t");
        table.set_bool("flag", false);
        assert_eq!(table.get_number("flag"), -1.0);
        assert!(!table.get_bool("flag"));
        assert!(!table.get_bool("missing"));
    }

    #[test]
    fn test_observers_per_key() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut table = ValueTable::new("t");
        let sink = log.clone();
        table.subscribe("hp", move |c| sink.borrow_mut().push(c.value));

        table.set_number("hp", 1.0);
        table.set_number("mp", 2.0);
        assert!(table.remove("hp"));
        assert!(!table.remove("hp"));

        assert_eq!(*log.borrow(), vec![Some(1.0), None]);
    }

    #[test]
    fn test_from_json() {
        let table = ValueTable::from_json(r#"{"name":"cfg","values":{"dur":3.5}}"#).unwrap();
        assert_eq!(table.name(), "cfg");
        assert_eq!(table.get_number("dur"), 3.5);
    }

    #[test]
    fn test_hash_map_lookup() {
        let mut map: HashMap<String, f64> = HashMap::new();
        map.set_number("a", 1.0);
        assert_eq!(map.get_number("a"), 1.0);
        assert_eq!(map.get_number("b"), 0.0);
    }
}

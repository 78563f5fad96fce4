//! Immutable key/value context.
//!
//! Context is never mutated in place. An `assign` produces a new value with
//! the generation counter advanced; the previous value stays untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key/value updates produced by an `assign` action.
pub type Updates = Vec<(String, Value)>;

/// Domain data carried alongside the configuration.
///
/// # Example
///
/// ```rust
/// use parley::core::Context;
/// use serde_json::json;
///
/// let empty = Context::new();
/// let next = empty.with_updates(vec![("title".to_string(), json!("Lunch"))]);
///
/// assert_eq!(next.get_str("title"), Some("Lunch"));
/// assert_eq!(next.generation(), 1);
/// assert!(empty.get("title").is_none()); // original unchanged
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    generation: u64,
    values: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a generation-zero context from initial values.
    pub fn from_values<K, I>(values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            generation: 0,
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Number of assignments that produced this value.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Return a new context with `updates` applied, in order.
    pub fn with_updates(&self, updates: Updates) -> Self {
        let mut values = self.values.clone();
        for (key, value) in updates {
            values.insert(key, value);
        }
        Self {
            generation: self.generation + 1,
            values,
        }
    }
}

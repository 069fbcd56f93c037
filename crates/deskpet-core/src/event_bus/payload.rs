//! Event payloads.
//!
//! A payload is an opaque key/value object handed to filters and handlers.
//! The bus never inspects it. Cloning a payload copies the top-level map,
//! so an emitter mutating its own copy cannot affect a payload that is still
//! queued for asynchronous execution or held for throttled replay.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key/value data accompanying an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventPayload(Map<String, Value>);

impl EventPayload {
    /// Create an empty payload
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert a value, returning the previous one for this key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Look up a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the payload has a value for `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of top-level entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload has no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the payload, returning the underlying map
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for EventPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Objects become the payload map as-is, `null` becomes an empty payload and
/// any other value is stored under the `"value"` key.
impl From<Value> for EventPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            Value::Null => Self::new(),
            other => Self::new().with("value", other),
        }
    }
}

impl From<EventPayload> for Value {
    fn from(payload: EventPayload) -> Self {
        Value::Object(payload.0)
    }
}

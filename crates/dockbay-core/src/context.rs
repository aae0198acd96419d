//! Caller-owned key/value state (one instance per session or conversation).
//!
//! The router keeps sticky selections and round-robin positions here rather
//! than in itself, so two sessions never share rotation state.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

pub trait ContextStore: Send + Sync {
    fn get_var(&self, key: &str) -> Option<Value>;
    fn set_var(&self, key: &str, value: Value);

    /// Read-then-increment; returns the value before the increment.
    ///
    /// The default is not atomic. Stores shared between concurrent calls
    /// should override it.
    fn fetch_add(&self, key: &str, delta: i64) -> i64 {
        let current = self.get_var(key).and_then(|v| v.as_i64()).unwrap_or(0);
        self.set_var(key, Value::from(current.wrapping_add(delta)));
        current
    }
}

#[derive(Debug, Default)]
pub struct MemoryContext {
    vars: Mutex<HashMap<String, Value>>,
}

impl MemoryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vars.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.lock().is_empty()
    }
}

impl ContextStore for MemoryContext {
    fn get_var(&self, key: &str) -> Option<Value> {
        self.vars.lock().get(key).cloned()
    }

    fn set_var(&self, key: &str, value: Value) {
        self.vars.lock().insert(key.to_string(), value);
    }

    fn fetch_add(&self, key: &str, delta: i64) -> i64 {
        let mut vars = self.vars.lock();
        let current = vars.get(key).and_then(Value::as_i64).unwrap_or(0);
        vars.insert(key.to_string(), Value::from(current.wrapping_add(delta)));
        current
    }
}

//! Structured payload predicates shared by every vector index.
//!
//! A [`FilterSpec`] has three groups, each mapping a payload field to either a
//! scalar or a list of accepted values:
//!
//! - `must`: every field must match (a list means any of its values)
//! - `any`: at least one field/value must match; empty means no constraint
//! - `must_not`: no field/value may match
//!
//! When the payload field itself holds a list, matching is membership.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::Metadata;

pub type Conditions = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub must: Conditions,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub any: Conditions,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub must_not: Conditions,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.must.insert(key.into(), value.into());
        self
    }

    pub fn any(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.any.insert(key.into(), value.into());
        self
    }

    pub fn must_not(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.must_not.insert(key.into(), value.into());
        self
    }

    /// Flat `{field: value | [values]}` map: AND across keys, OR within a key.
    pub fn from_flat(map: Conditions) -> Self {
        Self { must: map, ..Self::default() }
    }

    /// Accepts either the structured `{must, any, must_not}` form or a flat map.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(obj) => obj,
            other => return Err(Error::Validation(format!("filter must be an object, got {other}"))),
        };
        let structured = ["must", "any", "must_not"].iter().any(|k| obj.contains_key(*k));
        if structured {
            let spec: FilterSpec = serde_json::from_value(value.clone())
                .map_err(|e| Error::Validation(format!("invalid filter spec: {e}")))?;
            return Ok(spec);
        }
        Ok(Self::from_flat(obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect()))
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.any.is_empty() && self.must_not.is_empty()
    }

    /// Combine several specs into one. Values for the same key are unioned, so
    /// two sources requiring `status = a` and `status = b` yield `status in [a, b]`.
    pub fn merge<I>(specs: I) -> Self
    where
        I: IntoIterator<Item = FilterSpec>,
    {
        let mut out = FilterSpec::default();
        for spec in specs {
            union_into(&mut out.must, spec.must);
            union_into(&mut out.any, spec.any);
            union_into(&mut out.must_not, spec.must_not);
        }
        out
    }

    pub fn matches(&self, payload: &Metadata) -> bool {
        let must_ok = self.must.iter().all(|(k, expected)| field_matches(payload.get(k), expected));
        if !must_ok {
            return false;
        }
        let excluded = self.must_not.iter().any(|(k, expected)| field_matches(payload.get(k), expected));
        if excluded {
            return false;
        }
        self.any.is_empty() || self.any.iter().any(|(k, expected)| field_matches(payload.get(k), expected))
    }
}

fn union_into(target: &mut Conditions, source: Conditions) {
    for (key, value) in source {
        match target.remove(&key) {
            None => {
                target.insert(key, value);
            }
            Some(existing) => {
                let mut values = flatten(existing);
                for v in flatten(value) {
                    if !values.iter().any(|x| scalar_eq(x, &v)) {
                        values.push(v);
                    }
                }
                let merged = if values.len() == 1 { values.remove(0) } else { Value::Array(values) };
                target.insert(key, merged);
            }
        }
    }
}

fn flatten(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// `expected` may be a list of accepted values.
pub fn field_matches(actual: Option<&Value>, expected: &Value) -> bool {
    let Some(actual) = actual else { return false };
    match expected {
        Value::Array(options) => options.iter().any(|e| single_matches(actual, e)),
        single => single_matches(actual, single),
    }
}

fn single_matches(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| scalar_eq(item, expected)),
        scalar => scalar_eq(scalar, expected),
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

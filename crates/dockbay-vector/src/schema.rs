use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use dockbay_core::{CollectionSchema, Distance, Error, Result};

pub const DEFAULT_VECTOR_SIZE: usize = 256;

/// Per-collection override in the `[schema.collections.<key>]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionOverride {
    pub name: Option<String>,
    pub vector_size: Option<usize>,
    pub distance: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaSettings {
    pub vector_size: usize,
    pub distance: String,
    pub name_prefix: String,
    pub collections: BTreeMap<String, CollectionOverride>,
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            vector_size: DEFAULT_VECTOR_SIZE,
            distance: "cosine".to_string(),
            name_prefix: String::new(),
            collections: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    name: Option<String>,
    vector_size: usize,
    distance: Distance,
}

/// Schema authority built once from configuration.
///
/// Unlisted collection keys map to `<name_prefix><key>` with the default
/// size and metric.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticSchema {
    vector_size: usize,
    distance: Distance,
    name_prefix: String,
    entries: BTreeMap<String, Entry>,
}

impl StaticSchema {
    pub fn new(vector_size: usize) -> Self {
        Self { vector_size, distance: Distance::Cosine, name_prefix: String::new(), entries: BTreeMap::new() }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_collection(mut self, key: impl Into<String>, name: impl Into<String>, vector_size: usize) -> Self {
        let distance = self.distance;
        self.entries.insert(key.into(), Entry { name: Some(name.into()), vector_size, distance });
        self
    }

    pub fn from_settings(settings: &SchemaSettings) -> Result<Self> {
        if settings.vector_size == 0 {
            return Err(Error::InvalidConfig("schema.vector_size must be positive".to_string()));
        }
        let distance = parse_distance(&settings.distance)?;
        let mut entries = BTreeMap::new();
        for (key, o) in &settings.collections {
            let vector_size = o.vector_size.unwrap_or(settings.vector_size);
            if vector_size == 0 {
                return Err(Error::InvalidConfig(format!("collection '{key}' has a zero vector_size")));
            }
            let distance = match &o.distance {
                Some(d) => parse_distance(d)?,
                None => distance,
            };
            entries.insert(key.clone(), Entry { name: o.name.clone(), vector_size, distance });
        }
        Ok(Self { vector_size: settings.vector_size, distance, name_prefix: settings.name_prefix.clone(), entries })
    }
}

fn parse_distance(raw: &str) -> Result<Distance> {
    Distance::parse(raw).ok_or_else(|| Error::InvalidConfig(format!("unknown distance '{raw}'")))
}

impl CollectionSchema for StaticSchema {
    fn physical_name(&self, collection_key: &str) -> String {
        self.entries
            .get(collection_key)
            .and_then(|e| e.name.clone())
            .unwrap_or_else(|| format!("{}{collection_key}", self.name_prefix))
    }

    fn vector_size(&self, collection_key: &str) -> usize {
        self.entries.get(collection_key).map_or(self.vector_size, |e| e.vector_size)
    }

    fn distance(&self, collection_key: &str) -> Distance {
        self.entries.get(collection_key).map_or(self.distance, |e| e.distance)
    }
}

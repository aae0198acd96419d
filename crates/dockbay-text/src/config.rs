use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_LENGTH: usize = 800;
pub const DEFAULT_MIN_LENGTH: usize = 200;
pub const DEFAULT_OVERLAP: usize = 50;

fn default_inline_fields() -> Vec<String> {
    ["name", "tags", "type"].iter().map(|s| s.to_string()).collect()
}

/// `[chunker]` section as written by operators. Signed so that bad values can
/// be detected and replaced instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerSettings {
    pub max_length: i64,
    pub min_length: i64,
    pub overlap: i64,
    pub inline_meta_fields: Vec<String>,
}

impl Default for ChunkerSettings {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH as i64,
            min_length: DEFAULT_MIN_LENGTH as i64,
            overlap: DEFAULT_OVERLAP as i64,
            inline_meta_fields: default_inline_fields(),
        }
    }
}

/// Resolved chunker configuration. Lengths are in characters.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkerConfig {
    pub max_length: usize,
    pub min_length: usize,
    pub overlap: usize,
    pub inline_meta_fields: Vec<String>,
}

impl ChunkerConfig {
    pub fn from_settings(settings: &ChunkerSettings) -> Self {
        let max_length = usize::try_from(settings.max_length)
            .ok()
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_LENGTH);
        let mut min_length = usize::try_from(settings.min_length).unwrap_or(DEFAULT_MIN_LENGTH);
        if min_length >= max_length {
            min_length = max_length / 4;
        }
        let overlap = usize::try_from(settings.overlap)
            .unwrap_or(DEFAULT_OVERLAP)
            .min(max_length / 4);
        Self { max_length, min_length, overlap, inline_meta_fields: settings.inline_meta_fields.clone() }
    }

    pub fn with_lengths(max_length: i64, min_length: i64, overlap: i64) -> Self {
        Self::from_settings(&ChunkerSettings { max_length, min_length, overlap, ..ChunkerSettings::default() })
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self::from_settings(&ChunkerSettings::default())
    }
}

impl From<ChunkerSettings> for ChunkerConfig {
    fn from(settings: ChunkerSettings) -> Self {
        Self::from_settings(&settings)
    }
}

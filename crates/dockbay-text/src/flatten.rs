//! Record flattening: one markdown document per record, with short fields
//! collected under `## Metadata` and long fields as their own sections.

use serde_json::{Map, Value};

use dockbay_core::Metadata;

/// Compact JSON up to this many chars stays a metadata line.
const SMALL_JSON_LIMIT: usize = 100;
/// Strings at or below `max(min_length / 2, FLOOR)` chars are metadata.
const SHORT_STRING_FLOOR: usize = 100;
/// Inline prefix values are clipped to keep the prefix line short.
const INLINE_VALUE_LIMIT: usize = 80;

pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub(crate) fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

pub(crate) fn record_title(root: &Value, fields: &Map<String, Value>) -> String {
    ["name", "title"]
        .iter()
        .find_map(|k| {
            root.get(*k)
                .or_else(|| fields.get(*k))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or("Untitled")
        .to_string()
}

/// Returns `None` when the record has nothing worth indexing.
pub(crate) fn flatten_record(root: &Value, fields: &Map<String, Value>, min_length: usize) -> Option<String> {
    let title = record_title(root, fields);
    let threshold = (min_length / 2).max(SHORT_STRING_FLOOR);
    let mut meta_lines: Vec<String> = Vec::new();
    let mut sections: Vec<(String, String)> = Vec::new();

    for (key, value) in fields {
        match value {
            Value::Null => {}
            Value::Bool(b) => meta_lines.push(format!("- {key}: {b}")),
            Value::Number(n) => meta_lines.push(format!("- {key}: {n}")),
            Value::String(s) => {
                let s = normalize_newlines(s.trim());
                if s.is_empty() || (key == "name" && s == title) {
                    continue;
                }
                if char_len(&s) <= threshold {
                    meta_lines.push(format!("- {key}: {}", s.replace('\n', " ")));
                } else {
                    sections.push((key.clone(), s));
                }
            }
            Value::Array(items) if items.is_empty() => {}
            Value::Object(obj) if obj.is_empty() => {}
            compound => {
                let compact = compound.to_string();
                if char_len(&compact) <= SMALL_JSON_LIMIT {
                    meta_lines.push(format!("- {key}: {compact}"));
                } else {
                    let pretty = serde_json::to_string_pretty(compound).unwrap_or(compact);
                    sections.push((key.clone(), pretty));
                }
            }
        }
    }

    if meta_lines.is_empty() && sections.is_empty() {
        return None;
    }

    let mut doc = format!("# {title}");
    if !meta_lines.is_empty() {
        doc.push_str("\n\n## Metadata\n");
        doc.push_str(&meta_lines.join("\n"));
    }
    for (key, body) in sections {
        doc.push_str(&format!("\n\n## {key}\n\n{body}"));
    }
    Some(doc)
}

/// `<!-- name: … | tags: … | type: … -->`, or `None` when no field resolves.
pub(crate) fn inline_meta_line(
    wanted: &[String],
    metadata: &Metadata,
    root: &Value,
    fields: &Map<String, Value>,
) -> Option<String> {
    let parts: Vec<String> = wanted
        .iter()
        .filter_map(|field| {
            let value = metadata
                .get(field)
                .or_else(|| root.get(field.as_str()))
                .or_else(|| fields.get(field))?;
            render_inline(value).map(|v| format!("{field}: {v}"))
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(format!("<!-- {} -->", parts.join(" | ")))
    }
}

fn render_inline(value: &Value) -> Option<String> {
    let rendered = match value {
        Value::Null => return None,
        Value::String(s) => s.split_whitespace().collect::<Vec<_>>().join(" "),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(render_inline)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    };
    if rendered.is_empty() {
        return None;
    }
    // comment terminators inside values would end the prefix early
    let rendered = rendered.replace("-->", "->");
    Some(rendered.chars().take(INLINE_VALUE_LIMIT).collect())
}

/// Stable identity for chunk ids: caller id, record id, or a content hash.
pub(crate) fn base_id(metadata: &Metadata, root: &Value, document: &str) -> String {
    let explicit = metadata.get("id").or_else(|| root.get("id")).and_then(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    explicit.unwrap_or_else(|| blake3::hash(document.as_bytes()).to_hex()[..16].to_string())
}

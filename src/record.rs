// Copyright (c) 2025 - Cowboy AI, Inc.

//! Record normalization
//!
//! Converts a raw Outscale VM record (nested JSON as returned by `ReadVms`)
//! into a canonical [`AttributeMap`]: a flat mapping from dotted attribute
//! path to value. Nested objects are flattened into dotted paths with
//! snake_case segments; list-valued leaves stay lists so tag and interface
//! collections remain usable as expression inputs. Missing optional fields
//! are simply absent from the map, never null-filled.
//!
//! Canonical keys produced for every record:
//!
//! - `id` - the VM identifier (`VmId`), required
//! - `state`, `vm_type`, `private_ip`, `public_ip`, `subregion`
//! - `outscale_tags` - tag key/value mapping
//! - `outscale_tags.<Key>` - one entry per tag, key kept verbatim

use std::collections::BTreeMap;

use serde_json::Value;

use crate::errors::{InventoryError, InventoryResult};

/// Raw provider record, opaque nested JSON
pub type RawRecord = Value;

/// Canonical per-host mapping from dotted attribute path to value
pub type AttributeMap = BTreeMap<String, Value>;

/// Normalize one raw VM record into an [`AttributeMap`].
///
/// Fails with [`InventoryError::MalformedRecord`] when the record has no
/// `VmId`; callers skip such records with a warning rather than aborting
/// the run.
pub fn normalize(raw: &RawRecord) -> InventoryResult<AttributeMap> {
    let obj = raw
        .as_object()
        .ok_or_else(|| InventoryError::MalformedRecord("record is not an object".to_string()))?;

    let vm_id = obj
        .get("VmId")
        .and_then(Value::as_str)
        .ok_or_else(|| InventoryError::MalformedRecord("record has no VmId".to_string()))?;

    let mut attrs = AttributeMap::new();

    for (key, value) in obj {
        // Tags get their own canonical representation below
        if key == "Tags" {
            continue;
        }
        flatten_into(&mut attrs, &snake_case(key), value);
    }

    attrs.insert("id".to_string(), Value::String(vm_id.to_string()));

    // `state`, `vm_type` and the IPs already land on their canonical
    // names through snake_casing; the subregion needs a real alias.
    alias(&mut attrs, "placement.subregion_name", "subregion");

    let tags = tag_map(obj.get("Tags"));
    for (key, value) in &tags {
        attrs.insert(format!("outscale_tags.{key}"), value.clone());
    }
    attrs.insert(
        "outscale_tags".to_string(),
        Value::Object(tags.into_iter().collect()),
    );

    Ok(attrs)
}

/// Look up a dotted attribute path.
///
/// Tries the flat dotted key first, then walks the path segments through
/// nested object values, so both `outscale_tags.Name` (flattened) and
/// `placement.tenancy` (nested) resolve.
pub fn lookup<'a>(attrs: &'a AttributeMap, path: &str) -> Option<&'a Value> {
    if let Some(value) = attrs.get(path) {
        return Some(value);
    }

    let mut segments = path.split('.');
    let mut current = attrs.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn alias(attrs: &mut AttributeMap, from: &str, to: &str) {
    if let Some(value) = attrs.get(from).cloned() {
        attrs.insert(to.to_string(), value);
    }
}

fn flatten_into(attrs: &mut AttributeMap, path: &str, value: &Value) {
    match value {
        Value::Object(fields) => {
            for (key, nested) in fields {
                flatten_into(attrs, &format!("{path}.{}", snake_case(key)), nested);
            }
        }
        // Lists stay intact as leaves
        other => {
            attrs.insert(path.to_string(), other.clone());
        }
    }
}

/// Collect the Outscale tag list (`[{Key, Value}, ..]`) into a mapping.
/// Entries without a `Value` are dropped, matching the provider contract.
fn tag_map(tags: Option<&Value>) -> BTreeMap<String, Value> {
    let mut map = BTreeMap::new();
    let Some(Value::Array(entries)) = tags else {
        return map;
    };
    for entry in entries {
        let (Some(key), Some(value)) = (
            entry.get("Key").and_then(Value::as_str),
            entry.get("Value"),
        ) else {
            continue;
        };
        if !value.is_null() {
            map.insert(key.to_string(), value.clone());
        }
    }
    map
}

/// Convert a PascalCase provider field name to snake_case
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, ch) in chars.iter().enumerate() {
        if ch.is_ascii_uppercase() {
            let prev_lower = i > 0 && chars[i - 1].is_ascii_lowercase();
            let next_lower = i + 1 < chars.len() && chars[i + 1].is_ascii_lowercase();
            if i > 0 && (prev_lower || next_lower) {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(*ch);
        }
    }
    out
}

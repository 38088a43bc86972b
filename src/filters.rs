// Copyright (c) 2025 - Cowboy AI, Inc.

//! Filter evaluation
//!
//! Filter rules form an unordered conjunction of provider-side selection
//! criteria for `ReadVms`. All known criteria are pushed down to the API
//! client via their provider names; the in-process role is limited to
//! validating configured keys (unknown keys fail fast) and re-checking
//! criteria with a mapped attribute path after normalization, for clients
//! that cannot express them server-side.
//!
//! A [`FilterSet`] also supplies the Fetch Cache key: its canonical
//! serialization is order-independent so `{states: [a, b]}` and
//! `{states: [b, a]}` memoize under the same entry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{InventoryError, InventoryResult};
use crate::record::{lookup, AttributeMap};

/// One provider filter criterion known to this plugin
struct FilterSpec {
    /// Configuration key (snake_case)
    key: &'static str,
    /// Provider API name for pushdown
    api_name: &'static str,
    /// Attribute path for the in-process membership re-check, when the
    /// criterion maps onto a single normalized attribute
    attribute: Option<&'static str>,
}

/// Filters accepted by the `ReadVms` call
const KNOWN_FILTERS: &[FilterSpec] = &[
    FilterSpec { key: "vm_ids", api_name: "VmIds", attribute: Some("id") },
    FilterSpec { key: "states", api_name: "VmStateNames", attribute: Some("state") },
    FilterSpec { key: "vm_types", api_name: "VmTypes", attribute: Some("vm_type") },
    FilterSpec { key: "subregion_names", api_name: "SubregionNames", attribute: Some("subregion") },
    FilterSpec { key: "private_ips", api_name: "PrivateIps", attribute: Some("private_ip") },
    FilterSpec { key: "public_ips", api_name: "PublicIps", attribute: Some("public_ip") },
    FilterSpec { key: "image_ids", api_name: "ImageIds", attribute: Some("image_id") },
    FilterSpec { key: "keypair_names", api_name: "KeypairNames", attribute: Some("keypair_name") },
    FilterSpec { key: "net_ids", api_name: "NetIds", attribute: Some("net_id") },
    FilterSpec { key: "subnet_ids", api_name: "SubnetIds", attribute: Some("subnet_id") },
    FilterSpec { key: "security_group_ids", api_name: "SecurityGroupIds", attribute: None },
    FilterSpec { key: "security_group_names", api_name: "SecurityGroupNames", attribute: None },
    FilterSpec { key: "tag_keys", api_name: "TagKeys", attribute: None },
    FilterSpec { key: "tag_values", api_name: "TagValues", attribute: None },
    FilterSpec { key: "tags", api_name: "Tags", attribute: None },
];

fn spec_for(key: &str) -> Option<&'static FilterSpec> {
    KNOWN_FILTERS.iter().find(|spec| spec.key == key)
}

/// A configured filter value: scalar shorthand or explicit list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

impl FilterValue {
    fn values(&self) -> Vec<String> {
        match self {
            FilterValue::One(value) => vec![value.clone()],
            FilterValue::Many(values) => values.clone(),
        }
    }
}

/// Validated, canonicalized conjunction of provider filter criteria
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    criteria: BTreeMap<&'static str, Vec<String>>,
}

impl FilterSet {
    /// Build from configuration, failing fast on unknown filter keys
    pub fn from_config(filters: &BTreeMap<String, FilterValue>) -> InventoryResult<Self> {
        let mut criteria = BTreeMap::new();
        for (key, value) in filters {
            let spec = spec_for(key).ok_or_else(|| {
                InventoryError::Configuration(format!("unknown filter key '{key}'"))
            })?;
            let mut values = value.values();
            values.sort();
            values.dedup();
            criteria.insert(spec.key, values);
        }
        Ok(Self { criteria })
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Order-independent serialization, used as the Fetch Cache key
    pub fn canonical_key(&self) -> String {
        let mut parts = Vec::with_capacity(self.criteria.len());
        for (key, values) in &self.criteria {
            parts.push(format!("{key}={}", values.join(",")));
        }
        parts.join("&")
    }

    /// Provider-side representation for the `ReadVms` `Filters` object
    pub fn to_api_filters(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (key, values) in &self.criteria {
            let spec = spec_for(key).expect("criteria only hold known keys");
            map.insert(
                spec.api_name.to_string(),
                Value::Array(values.iter().cloned().map(Value::String).collect()),
            );
        }
        map
    }

    /// In-process re-check of the conjunction against a normalized record.
    ///
    /// Criteria with a mapped attribute path are tested as membership of
    /// the attribute value; tag criteria are tested against the
    /// `outscale_tags` mapping. Criteria without a local mapping are
    /// pushdown-only and pass here.
    pub fn matches(&self, attrs: &AttributeMap) -> bool {
        self.criteria.iter().all(|(key, values)| {
            let spec = spec_for(key).expect("criteria only hold known keys");
            match (spec.key, spec.attribute) {
                ("tag_keys", _) => tags(attrs).any(|(k, _)| values.contains(&k)),
                ("tag_values", _) => tags(attrs).any(|(_, v)| values.contains(&v)),
                ("tags", _) => tags(attrs).any(|(k, v)| values.contains(&format!("{k}={v}"))),
                (_, Some(path)) => match lookup(attrs, path).and_then(scalar_string) {
                    Some(actual) => values.contains(&actual),
                    None => false,
                },
                (_, None) => true,
            }
        })
    }
}

fn tags(attrs: &AttributeMap) -> impl Iterator<Item = (String, String)> + '_ {
    attrs
        .get("outscale_tags")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|map| {
            map.iter().filter_map(|(k, v)| {
                scalar_string(v).map(|value| (k.clone(), value))
            })
        })
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Keep only records whose normalized attributes satisfy the filter set
pub fn select<'a>(
    records: impl IntoIterator<Item = &'a AttributeMap>,
    filter_set: &FilterSet,
) -> Vec<&'a AttributeMap> {
    records
        .into_iter()
        .filter(|attrs| filter_set.matches(attrs))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filters(pairs: &[(&str, FilterValue)]) -> BTreeMap<String, FilterValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_unknown_filter_key_fails_fast() {
        let config = filters(&[("flavor", FilterValue::One("large".to_string()))]);
        let err = FilterSet::from_config(&config).unwrap_err();
        assert!(matches!(err, InventoryError::Configuration(_)));
    }

    #[test]
    fn test_canonical_key_is_order_independent() {
        let a = FilterSet::from_config(&filters(&[
            ("states", FilterValue::Many(vec!["running".into(), "pending".into()])),
            ("vm_types", FilterValue::One("tinav4.c2r4p2".into())),
        ]))
        .unwrap();
        let b = FilterSet::from_config(&filters(&[
            ("vm_types", FilterValue::One("tinav4.c2r4p2".into())),
            ("states", FilterValue::Many(vec!["pending".into(), "running".into()])),
        ]))
        .unwrap();
        assert_eq!(a.canonical_key(), b.canonical_key());
        assert_eq!(a, b);
    }

    #[test]
    fn test_api_filter_names() {
        let set = FilterSet::from_config(&filters(&[(
            "states",
            FilterValue::Many(vec!["running".into()]),
        )]))
        .unwrap();
        let api = set.to_api_filters();
        assert_eq!(api["VmStateNames"], json!(["running"]));
    }

    #[test]
    fn test_local_membership_check() {
        let set = FilterSet::from_config(&filters(&[(
            "states",
            FilterValue::Many(vec!["running".into(), "pending".into()]),
        )]))
        .unwrap();

        let mut attrs = AttributeMap::new();
        attrs.insert("state".to_string(), json!("running"));
        assert!(set.matches(&attrs));

        attrs.insert("state".to_string(), json!("stopped"));
        assert!(!set.matches(&attrs));

        // Missing attribute fails the criterion
        attrs.remove("state");
        assert!(!set.matches(&attrs));
    }

    #[test]
    fn test_tag_criteria() {
        let mut attrs = AttributeMap::new();
        attrs.insert(
            "outscale_tags".to_string(),
            json!({"Name": "web01", "env": "prod"}),
        );

        let by_key = FilterSet::from_config(&filters(&[(
            "tag_keys",
            FilterValue::One("env".into()),
        )]))
        .unwrap();
        assert!(by_key.matches(&attrs));

        let by_pair = FilterSet::from_config(&filters(&[(
            "tags",
            FilterValue::One("env=prod".into()),
        )]))
        .unwrap();
        assert!(by_pair.matches(&attrs));

        let by_pair_miss = FilterSet::from_config(&filters(&[(
            "tags",
            FilterValue::One("env=staging".into()),
        )]))
        .unwrap();
        assert!(!by_pair_miss.matches(&attrs));
    }

    #[test]
    fn test_select_applies_conjunction() {
        let set = FilterSet::from_config(&filters(&[(
            "states",
            FilterValue::One("running".into()),
        )]))
        .unwrap();

        let mut running = AttributeMap::new();
        running.insert("state".to_string(), json!("running"));
        let mut stopped = AttributeMap::new();
        stopped.insert("state".to_string(), json!("stopped"));

        let kept = select([&running, &stopped], &set);
        assert_eq!(kept.len(), 1);
    }
}

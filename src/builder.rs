// Copyright (c) 2025 - Cowboy AI, Inc.

//! Group Graph Builder
//!
//! Applies the compiled rule set to the normalized hosts, in
//! rule-declaration order:
//!
//! 1. static groups and their parent edges from configuration
//! 2. per host: provider variables, then `compose` variables
//!    (last rule wins for a variable name)
//! 3. per host: built-in `group_by` dimensions (tags, region, subregion,
//!    vm_type, state), then `keyed_groups` expansion into dynamic groups
//!
//! Dynamic groups are always leaves relative to their declared parents, so
//! cycles can only come from static configuration; those fail the whole
//! build.

use serde_json::Value;
use tracing::debug;

use crate::config::{GroupByField, IpPreference};
use crate::errors::InventoryResult;
use crate::expr::truthy;
use crate::graph::{sanitize_group_name, InventoryGraph};
use crate::record::{lookup, AttributeMap};
use crate::rules::CompiledRules;

/// Provider attributes exposed on every host as variables
const PROVIDER_VARIABLES: &[(&str, &str)] = &[
    ("outscale_vm_id", "id"),
    ("outscale_state", "state"),
    ("outscale_vm_type", "vm_type"),
    ("outscale_subregion", "subregion"),
    ("outscale_tags", "outscale_tags"),
    ("private_ip", "private_ip"),
    ("public_ip", "public_ip"),
];

/// Build the group/host graph for the given hosts and rules.
///
/// `hosts` carries (host key, attributes) pairs in visitation order; the
/// resulting graph does not depend on that order.
pub fn build_graph(
    hosts: &[(String, AttributeMap)],
    rules: &CompiledRules,
    ip_preference: IpPreference,
) -> InventoryResult<InventoryGraph> {
    let mut graph = InventoryGraph::new();

    // Static groups exist even when no host matches their predicate
    for rule in &rules.statics {
        graph.add_group(&rule.name);
        for parent in &rule.parents {
            graph.add_child(parent, &rule.name)?;
        }
    }

    for (name, attrs) in hosts {
        graph.add_host(name, attrs.clone());

        for (variable, path) in PROVIDER_VARIABLES {
            if let Some(value) = lookup(attrs, path) {
                graph.set_variable(name, variable, value.clone());
            }
        }
        if let Some(address) = select_address(attrs, ip_preference) {
            graph.set_variable(name, "ansible_host", address);
        }

        for rule in &rules.statics {
            let matches = rule
                .predicate
                .as_ref()
                .map(|predicate| predicate.matches(attrs))
                .unwrap_or(false);
            if matches {
                graph.add_host_to_group(&rule.name, name)?;
            }
        }

        for rule in &rules.compose {
            if let Some(value) = rule.expression.evaluate(attrs) {
                graph.set_variable(name, &rule.variable, value);
            }
        }

        for field in &rules.group_by {
            for group in builtin_group_names(*field, attrs, rules.region.as_deref()) {
                graph.add_host_to_group(&group, name)?;
            }
        }

        for rule in &rules.keyed {
            let result = rule.source.evaluate(attrs);
            for group in rule.group_names(result) {
                graph.add_host_to_group(&group, name)?;
                for parent in &rule.parent_groups {
                    graph.add_child(parent, &group)?;
                }
            }
        }
    }

    debug!(
        hosts = hosts.len(),
        groups = graph.groups().count(),
        "inventory graph built"
    );
    Ok(graph)
}

/// Group names for one built-in `group_by` dimension. Hosts missing the
/// underlying attribute simply join no group under that dimension.
fn builtin_group_names(
    field: GroupByField,
    attrs: &AttributeMap,
    region: Option<&str>,
) -> Vec<String> {
    match field {
        GroupByField::Tags => attrs
            .get("outscale_tags")
            .and_then(Value::as_object)
            .map(|tags| {
                tags.iter()
                    .filter_map(|(key, value)| {
                        tag_text(value)
                            .map(|text| format!("tag_{key}_{}", sanitize_group_name(&text)))
                    })
                    .collect()
            })
            .unwrap_or_default(),
        GroupByField::Region => region.map(str::to_string).into_iter().collect(),
        GroupByField::Subregion => attr_group(attrs, "subregion", None),
        GroupByField::VmType => attr_group(attrs, "vm_type", Some("vm_type")),
        GroupByField::State => attr_group(attrs, "state", Some("state")),
    }
}

fn attr_group(attrs: &AttributeMap, path: &str, prefix: Option<&str>) -> Vec<String> {
    let Some(text) = lookup(attrs, path).and_then(Value::as_str) else {
        return Vec::new();
    };
    let name = match prefix {
        Some(prefix) => format!("{prefix}_{text}"),
        None => text.to_string(),
    };
    vec![name]
}

fn tag_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Pick the host address according to the configured preference
fn select_address(attrs: &AttributeMap, preference: IpPreference) -> Option<Value> {
    let public = lookup(attrs, "public_ip").filter(|v| truthy(Some(v)));
    let private = lookup(attrs, "private_ip").filter(|v| truthy(Some(v)));
    match preference {
        IpPreference::PreferPublic => public.or(private).cloned(),
        IpPreference::PublicOnly => public.cloned(),
        IpPreference::PrivateOnly => private.cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InventoryConfig, KeyedGroupConfig, StaticGroupConfig};
    use crate::errors::InventoryError;
    use crate::graph::ALL_GROUP;
    use crate::record::normalize;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn host(vm_id: &str, tags: Value) -> (String, AttributeMap) {
        let attrs = normalize(&json!({
            "VmId": vm_id,
            "State": "running",
            "VmType": "tinav4.c2r4p2",
            "PublicIp": "203.0.113.10",
            "PrivateIp": "10.0.0.4",
            "Tags": tags,
        }))
        .unwrap();
        (vm_id.to_string(), attrs)
    }

    fn compile(config: &InventoryConfig) -> CompiledRules {
        CompiledRules::compile(config).unwrap()
    }

    #[test]
    fn test_hosts_always_in_all() {
        let hosts = vec![host("i-1", json!([])), host("i-2", json!([]))];
        let graph = build_graph(&hosts, &CompiledRules::default(), IpPreference::default()).unwrap();
        assert_eq!(graph.group(ALL_GROUP).unwrap().hosts().len(), 2);
    }

    #[test]
    fn test_provider_variables_and_address() {
        let hosts = vec![host("i-1", json!([]))];
        let graph = build_graph(&hosts, &CompiledRules::default(), IpPreference::default()).unwrap();
        let vars = graph.host("i-1").unwrap().variables();
        assert_eq!(vars["outscale_vm_id"], json!("i-1"));
        assert_eq!(vars["outscale_state"], json!("running"));
        assert_eq!(vars["ansible_host"], json!("203.0.113.10"));
    }

    #[test]
    fn test_private_only_address() {
        let hosts = vec![host("i-1", json!([]))];
        let graph =
            build_graph(&hosts, &CompiledRules::default(), IpPreference::PrivateOnly).unwrap();
        let vars = graph.host("i-1").unwrap().variables();
        assert_eq!(vars["ansible_host"], json!("10.0.0.4"));
    }

    #[test]
    fn test_keyed_groups_from_tag_pipeline() {
        let mut config = InventoryConfig::default();
        config.group_by = Vec::new();
        config.keyed_groups.push(KeyedGroupConfig {
            key: "outscale_tags.Ansible | default('') | split(',') | reject('equalto', '') | list"
                .to_string(),
            prefix: String::new(),
            separator: String::new(),
            default_value: None,
            parent_groups: Vec::new(),
        });
        let rules = compile(&config);

        let hosts = vec![
            host("i-1", json!([{"Key": "Ansible", "Value": "web,prod"}])),
            host("i-2", json!([])),
        ];
        let graph = build_graph(&hosts, &rules, IpPreference::default()).unwrap();

        assert_eq!(
            graph.group("web").unwrap().hosts().iter().collect::<Vec<_>>(),
            vec!["i-1"]
        );
        assert_eq!(
            graph.group("prod").unwrap().hosts().iter().collect::<Vec<_>>(),
            vec!["i-1"]
        );
        // The untagged host joined neither group
        assert_eq!(graph.host("i-2").unwrap().groups().len(), 1);
    }

    #[test]
    fn test_keyed_group_parents() {
        let mut config = InventoryConfig::default();
        config.keyed_groups.push(KeyedGroupConfig {
            key: "state".to_string(),
            prefix: "state".to_string(),
            separator: "_".to_string(),
            default_value: None,
            parent_groups: vec!["by_state".to_string()],
        });
        let rules = compile(&config);

        let graph =
            build_graph(&[host("i-1", json!([]))], &rules, IpPreference::default()).unwrap();
        let state_group = graph.group("state_running").unwrap();
        assert!(state_group.parents().contains("by_state"));
        assert!(graph.group("by_state").unwrap().parents().contains(ALL_GROUP));
    }

    #[test]
    fn test_keyed_parent_shared_by_multiple_hosts() {
        let mut config = InventoryConfig::default();
        config.keyed_groups.push(KeyedGroupConfig {
            key: "state".to_string(),
            prefix: "state".to_string(),
            separator: "_".to_string(),
            default_value: None,
            parent_groups: vec!["by_state".to_string()],
        });
        let rules = compile(&config);

        // Both hosts land in state_running and re-declare its parent edge
        let hosts = vec![host("i-1", json!([])), host("i-2", json!([]))];
        let graph = build_graph(&hosts, &rules, IpPreference::default()).unwrap();
        assert_eq!(graph.group("state_running").unwrap().hosts().len(), 2);
        assert!(graph.group("state_running").unwrap().parents().contains("by_state"));
    }

    #[test]
    fn test_builtin_group_by_defaults() {
        let config = InventoryConfig::default().with_region("eu-west-2");
        let rules = compile(&config);

        let attrs = normalize(&json!({
            "VmId": "i-1",
            "State": "running",
            "VmType": "tinav4.c2r4p2",
            "Placement": {"SubregionName": "eu-west-2a"},
            "Tags": [{"Key": "env", "Value": "prod: eu"}],
        }))
        .unwrap();
        let graph =
            build_graph(&[("i-1".to_string(), attrs)], &rules, IpPreference::default()).unwrap();

        let host = graph.host("i-1").unwrap();
        assert!(host.groups().contains("tag_env_prod__eu"));
        assert!(host.groups().contains("eu-west-2"));
        assert!(host.groups().contains("eu-west-2a"));
        assert!(host.groups().contains("vm_type_tinav4.c2r4p2"));
        assert!(host.groups().contains("state_running"));
    }

    #[test]
    fn test_builtin_group_by_skips_missing_attributes() {
        // No region configured, no placement, no tags
        let rules = compile(&InventoryConfig::default());
        let graph =
            build_graph(&[host("i-1", json!([]))], &rules, IpPreference::default()).unwrap();

        let host = graph.host("i-1").unwrap();
        assert!(host.groups().contains("state_running"));
        assert!(host.groups().contains("vm_type_tinav4.c2r4p2"));
        assert!(!host.groups().iter().any(|g| g.starts_with("tag_")));
        assert_eq!(host.groups().len(), 3);
    }

    #[test]
    fn test_group_by_disabled_adds_no_builtin_groups() {
        let mut config = InventoryConfig::default();
        config.group_by = Vec::new();
        let rules = compile(&config);

        let graph =
            build_graph(&[host("i-1", json!([]))], &rules, IpPreference::default()).unwrap();
        assert_eq!(graph.host("i-1").unwrap().groups().len(), 1);
    }

    #[test]
    fn test_compose_last_rule_wins() {
        let mut config = InventoryConfig::default();
        config
            .compose
            .insert("tier".to_string(), "vm_type".to_string());
        config
            .compose
            .insert("tier".to_string(), "state".to_string());
        let rules = compile(&config);

        let graph =
            build_graph(&[host("i-1", json!([]))], &rules, IpPreference::default()).unwrap();
        assert_eq!(
            graph.host("i-1").unwrap().variables()["tier"],
            json!("running")
        );
    }

    #[test]
    fn test_compose_absent_sets_nothing() {
        let mut config = InventoryConfig::default();
        config
            .compose
            .insert("missing".to_string(), "outscale_tags.nope".to_string());
        let rules = compile(&config);

        let graph =
            build_graph(&[host("i-1", json!([]))], &rules, IpPreference::default()).unwrap();
        assert!(!graph.host("i-1").unwrap().variables().contains_key("missing"));
    }

    #[test]
    fn test_static_groups_and_predicates() {
        let mut config = InventoryConfig::default();
        config.groups.insert(
            "webservers".to_string(),
            StaticGroupConfig::Predicate("outscale_tags.role == 'web'".to_string()),
        );
        config.groups.insert(
            "empty_static".to_string(),
            StaticGroupConfig::Predicate("outscale_tags.role == 'db'".to_string()),
        );
        let rules = compile(&config);

        let hosts = vec![host("i-1", json!([{"Key": "role", "Value": "web"}]))];
        let graph = build_graph(&hosts, &rules, IpPreference::default()).unwrap();

        assert!(graph.group("webservers").unwrap().hosts().contains("i-1"));
        // Declared groups exist even without members
        assert!(graph.group("empty_static").unwrap().hosts().is_empty());
    }

    #[test]
    fn test_static_cycle_fails_build() {
        let mut config = InventoryConfig::default();
        config.groups.insert(
            "a".to_string(),
            StaticGroupConfig::Detailed {
                when: None,
                parents: vec!["b".to_string()],
            },
        );
        config.groups.insert(
            "b".to_string(),
            StaticGroupConfig::Detailed {
                when: None,
                parents: vec!["a".to_string()],
            },
        );
        let rules = compile(&config);

        let err = build_graph(&[], &rules, IpPreference::default()).unwrap_err();
        assert!(matches!(err, InventoryError::GraphCycle(_)));
    }

    #[test]
    fn test_build_is_deterministic_under_reordering() {
        let mut config = InventoryConfig::default();
        config.keyed_groups.push(KeyedGroupConfig {
            key: "outscale_tags.Ansible | default('') | split(',') | reject('equalto', '') | list"
                .to_string(),
            prefix: String::new(),
            separator: String::new(),
            default_value: None,
            parent_groups: Vec::new(),
        });
        let rules = compile(&config);

        let mut hosts = vec![
            host("i-1", json!([{"Key": "Ansible", "Value": "web"}])),
            host("i-2", json!([{"Key": "Ansible", "Value": "web,db"}])),
            host("i-3", json!([])),
        ];
        let forward = build_graph(&hosts, &rules, IpPreference::default()).unwrap();
        hosts.reverse();
        let backward = build_graph(&hosts, &rules, IpPreference::default()).unwrap();

        assert_eq!(forward, backward);
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.

//! Group/host graph
//!
//! The inventory graph owns groups, hosts, membership sets and parent/child
//! edges. The implicit `all` root always exists and is an ancestor of every
//! other group: a group with no declared parent is a direct child of `all`,
//! one with declared parents reaches `all` through them.
//!
//! Parent/child edges come only from static configuration and from
//! `keyed_groups` parents; every edge insertion runs a depth-bounded
//! ancestor walk so a conflicting static declaration fails with
//! [`InventoryError::GraphCycle`] instead of producing an unresolvable
//! hierarchy.
//!
//! All collections are ordered (`BTreeMap`/`BTreeSet`) so two builds over
//! the same records and rules are structurally identical and emission order
//! is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};

use crate::errors::{InventoryError, InventoryResult};
use crate::record::AttributeMap;

/// Name of the implicit root group
pub const ALL_GROUP: &str = "all";

/// Characters the provider graph consumer cannot digest in group names,
/// each replaced with an underscore
const UNSAFE_GROUP_CHARS: [char; 3] = [':', '/', ' '];

/// Sanitize a dynamic group name component
pub fn sanitize_group_name(raw: &str) -> String {
    raw.replace(UNSAFE_GROUP_CHARS, "_")
}

/// One inventory host
#[derive(Debug, Clone, PartialEq)]
pub struct Host {
    name: String,
    attributes: AttributeMap,
    variables: BTreeMap<String, Value>,
    groups: BTreeSet<String>,
}

impl Host {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }
}

/// One inventory group
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    name: String,
    hosts: BTreeSet<String>,
    parents: BTreeSet<String>,
    children: BTreeSet<String>,
}

impl Group {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            hosts: BTreeSet::new(),
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hosts(&self) -> &BTreeSet<String> {
        &self.hosts
    }

    pub fn parents(&self) -> &BTreeSet<String> {
        &self.parents
    }

    pub fn children(&self) -> &BTreeSet<String> {
        &self.children
    }
}

/// Host-runtime output boundary: the graph is handed over through these
/// operations, never through runtime internals
pub trait InventorySink {
    fn add_group(&mut self, name: &str);
    fn add_child(&mut self, parent: &str, child: &str);
    fn add_host(&mut self, name: &str);
    fn add_host_to_group(&mut self, group: &str, host: &str);
    fn set_variable(&mut self, host: &str, name: &str, value: &Value);
}

/// The directed group/host graph, rebuilt from scratch every resolution
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryGraph {
    groups: BTreeMap<String, Group>,
    hosts: BTreeMap<String, Host>,
}

impl Default for InventoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryGraph {
    pub fn new() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(ALL_GROUP.to_string(), Group::new(ALL_GROUP));
        Self {
            groups,
            hosts: BTreeMap::new(),
        }
    }

    /// Create a group if absent. Idempotent. New groups start as children
    /// of `all` until a parent edge is declared.
    pub fn add_group(&mut self, name: &str) {
        if self.groups.contains_key(name) {
            return;
        }
        let mut group = Group::new(name);
        group.parents.insert(ALL_GROUP.to_string());
        self.groups.insert(name.to_string(), group);
        self.groups
            .get_mut(ALL_GROUP)
            .expect("all group always exists")
            .children
            .insert(name.to_string());
    }

    /// Create a host with its normalized attributes. Every host is a
    /// member of `all` unconditionally.
    pub fn add_host(&mut self, name: &str, attributes: AttributeMap) {
        let mut groups = BTreeSet::new();
        groups.insert(ALL_GROUP.to_string());
        self.groups
            .get_mut(ALL_GROUP)
            .expect("all group always exists")
            .hosts
            .insert(name.to_string());
        self.hosts.insert(
            name.to_string(),
            Host {
                name: name.to_string(),
                attributes,
                variables: BTreeMap::new(),
                groups,
            },
        );
    }

    /// Attach a host to a group. Re-addition is a no-op.
    pub fn add_host_to_group(&mut self, group: &str, host: &str) -> InventoryResult<()> {
        if !self.hosts.contains_key(host) {
            return Err(InventoryError::Configuration(format!(
                "cannot add unknown host '{host}' to group '{group}'"
            )));
        }
        self.add_group(group);
        self.groups
            .get_mut(group)
            .expect("group was just ensured")
            .hosts
            .insert(host.to_string());
        self.hosts
            .get_mut(host)
            .expect("host existence checked above")
            .groups
            .insert(group.to_string());
        Ok(())
    }

    /// Declare a parent/child edge between groups, creating both as
    /// needed. Fails with [`InventoryError::GraphCycle`] when the edge
    /// would make a group its own ancestor.
    pub fn add_child(&mut self, parent: &str, child: &str) -> InventoryResult<()> {
        // The edge closes a cycle iff the child is already an ancestor of
        // the new parent. An existing parent/child edge passes this check,
        // so re-declaring it stays idempotent.
        if parent == child || self.is_ancestor(parent, child) {
            return Err(InventoryError::GraphCycle(child.to_string()));
        }
        self.add_group(parent);
        self.add_group(child);

        let child_group = self.groups.get_mut(child).expect("child was just ensured");
        child_group.parents.insert(parent.to_string());
        // A declared parent supersedes the implicit `all` edge; `all`
        // stays an ancestor through the declared parent.
        if parent != ALL_GROUP {
            child_group.parents.remove(ALL_GROUP);
        }
        self.groups
            .get_mut(parent)
            .expect("parent was just ensured")
            .children
            .insert(child.to_string());
        if parent != ALL_GROUP {
            self.groups
                .get_mut(ALL_GROUP)
                .expect("all group always exists")
                .children
                .remove(child);
        }
        Ok(())
    }

    /// Depth-bounded ancestor walk: is `candidate` an ancestor of `name`?
    fn is_ancestor(&self, name: &str, candidate: &str) -> bool {
        let bound = self.groups.len() + 1;
        let mut frontier = vec![(name.to_string(), 0usize)];
        let mut seen = BTreeSet::new();
        while let Some((current, depth)) = frontier.pop() {
            if depth > bound || !seen.insert(current.clone()) {
                continue;
            }
            if let Some(group) = self.groups.get(&current) {
                for parent in &group.parents {
                    if parent == candidate {
                        return true;
                    }
                    frontier.push((parent.clone(), depth + 1));
                }
            }
        }
        false
    }

    /// Set a computed variable on a host; last write wins
    pub fn set_variable(&mut self, host: &str, name: &str, value: Value) {
        if let Some(host) = self.hosts.get_mut(host) {
            host.variables.insert(name.to_string(), value);
        }
    }

    pub fn host(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Replay the graph into a sink in deterministic order: groups first,
    /// then edges, then hosts with their memberships and variables.
    pub fn emit(&self, sink: &mut dyn InventorySink) {
        for name in self.groups.keys() {
            sink.add_group(name);
        }
        for (name, group) in &self.groups {
            for child in &group.children {
                sink.add_child(name, child);
            }
        }
        for (name, host) in &self.hosts {
            sink.add_host(name);
            for group in &host.groups {
                sink.add_host_to_group(group, name);
            }
            for (var, value) in &host.variables {
                sink.set_variable(name, var, value);
            }
        }
    }

    /// Render in the conventional dynamic-inventory JSON shape:
    /// one object per group plus `_meta.hostvars`.
    pub fn to_json(&self) -> Value {
        let mut root = serde_json::Map::new();
        for (name, group) in &self.groups {
            root.insert(
                name.clone(),
                json!({
                    "hosts": group.hosts.iter().collect::<Vec<_>>(),
                    "children": group.children.iter().collect::<Vec<_>>(),
                }),
            );
        }
        let mut hostvars = serde_json::Map::new();
        for (name, host) in &self.hosts {
            hostvars.insert(
                name.clone(),
                Value::Object(host.variables.clone().into_iter().collect()),
            );
        }
        root.insert("_meta".to_string(), json!({ "hostvars": hostvars }));
        Value::Object(root)
    }
}

// Copyright (c) 2025 - Cowboy AI, Inc.

//! Test fixtures for outscale-inventory
//!
//! Deterministic raw VM records and test doubles for the source, clock
//! and sink boundaries. Tests build records through these helpers, never
//! inline, so the shapes stay consistent across the suite.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{json, Value};

use outscale_inventory::cache::Clock;
use outscale_inventory::{FilterSet, InventoryResult, InventorySink, RawRecord, RecordSource};

/// A raw `ReadVms` record with the given id, state and tag pairs
pub fn vm(vm_id: &str, state: &str, tags: &[(&str, &str)]) -> Value {
    json!({
        "VmId": vm_id,
        "State": state,
        "VmType": "tinav4.c2r4p2",
        "PublicIp": format!("203.0.113.{}", vm_id.len()),
        "PrivateIp": format!("10.0.0.{}", vm_id.len()),
        "Placement": {"SubregionName": "eu-west-2a", "Tenancy": "default"},
        "Tags": tags
            .iter()
            .map(|(key, value)| json!({"Key": key, "Value": value}))
            .collect::<Vec<_>>(),
    })
}

/// A small fleet exercising tags, states and an untagged host
pub fn sample_fleet() -> Vec<Value> {
    vec![
        vm("i-web01", "running", &[("Name", "web01"), ("Ansible", "web,prod")]),
        vm("i-web02", "running", &[("Name", "web02"), ("Ansible", "web")]),
        vm("i-db01", "running", &[("Name", "db01"), ("Ansible", "db,prod")]),
        vm("i-spare", "stopped", &[]),
    ]
}

/// Manually advanced clock for cache expiry tests
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(
                DateTime::parse_from_rfc3339("2026-01-19T12:00:00Z")
                    .expect("valid fixture timestamp")
                    .with_timezone(&Utc),
            ),
        }
    }

    pub fn advance_secs(&self, seconds: i64) {
        let mut now = self.now.lock().unwrap();
        *now += TimeDelta::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Record source that counts fetches and serves a fixed record list
pub struct CountingSource {
    records: Vec<RawRecord>,
    fetches: AtomicUsize,
}

impl CountingSource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for CountingSource {
    async fn fetch_records(&self, _filters: &FilterSet) -> InventoryResult<Vec<RawRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}

/// Sink that records every operation it receives, for structural
/// equivalence checks against the graph
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub groups: Vec<String>,
    pub children: Vec<(String, String)>,
    pub hosts: Vec<String>,
    pub memberships: Vec<(String, String)>,
    pub variables: Vec<(String, String, Value)>,
}

impl InventorySink for RecordingSink {
    fn add_group(&mut self, name: &str) {
        self.groups.push(name.to_string());
    }

    fn add_child(&mut self, parent: &str, child: &str) {
        self.children.push((parent.to_string(), child.to_string()));
    }

    fn add_host(&mut self, name: &str) {
        self.hosts.push(name.to_string());
    }

    fn add_host_to_group(&mut self, group: &str, host: &str) {
        self.memberships.push((group.to_string(), host.to_string()));
    }

    fn set_variable(&mut self, host: &str, name: &str, value: &Value) {
        self.variables
            .push((host.to_string(), name.to_string(), value.clone()));
    }
}

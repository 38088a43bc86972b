// Copyright (c) 2025 - Cowboy AI, Inc.

//! Inventory resolution
//!
//! One resolution runs the whole pipeline: serve records through the
//! fetch cache, post-filter, normalize, key the hosts, then hand the rule
//! set to the Group Graph Builder. The graph is rebuilt from scratch every
//! time; only the cache outlives a resolution.
//!
//! ```text
//! RecordSource ──> FetchCache ──> FilterSet ──> normalize ──> build_graph
//!                                                                  │
//!                                              InventorySink <── emit
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use crate::builder::build_graph;
use crate::cache::FetchCache;
use crate::config::InventoryConfig;
use crate::errors::{InventoryError, InventoryResult};
use crate::filters::FilterSet;
use crate::graph::{InventoryGraph, InventorySink};
use crate::record::{lookup, normalize, AttributeMap};
use crate::rules::CompiledRules;
use crate::source::RecordSource;

/// Resolves inventories for one configured source
pub struct InventoryResolver {
    config: InventoryConfig,
    rules: CompiledRules,
    filters: FilterSet,
    cache: FetchCache,
}

impl InventoryResolver {
    /// Validate the configuration, compile its rules and set up the fetch
    /// cache. All configuration errors surface here, before any fetch.
    pub fn new(config: InventoryConfig) -> InventoryResult<Self> {
        let cache = if config.cache {
            FetchCache::new(Duration::from_secs(config.cache_ttl_secs))
        } else {
            FetchCache::disabled()
        };
        Self::with_cache(config, cache)
    }

    /// Like [`InventoryResolver::new`] with an injected cache, e.g. one
    /// built on a manual clock
    pub fn with_cache(config: InventoryConfig, cache: FetchCache) -> InventoryResult<Self> {
        config.validate()?;
        let rules = CompiledRules::compile(&config)?;
        let filters = config.filter_set()?;
        Ok(Self {
            config,
            rules,
            filters,
            cache,
        })
    }

    /// Resolve the full inventory graph from the record source
    pub async fn resolve(&self, source: &dyn RecordSource) -> InventoryResult<InventoryGraph> {
        let records = self.cache.get_records(source, &self.filters).await?;
        let key_attribute = self.config.host_key_source()?.attribute();

        let mut hosts: Vec<(String, AttributeMap)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for record in records.iter() {
            let attrs = match normalize(record) {
                Ok(attrs) => attrs,
                Err(err) => {
                    warn!(error = %err, "skipping malformed record");
                    continue;
                }
            };
            if !self.filters.matches(&attrs) {
                continue;
            }
            let Some(key) = lookup(&attrs, key_attribute).and_then(Value::as_str) else {
                warn!(
                    attribute = key_attribute,
                    "skipping record without host key attribute"
                );
                continue;
            };
            let key = key.to_string();

            match positions.get(&key) {
                Some(&position) => {
                    // Last-seen-wins, never a silent merge of attribute maps
                    warn!(error = %InventoryError::DuplicateHost(key.clone()),
                        "replacing earlier record for host");
                    hosts[position] = (key, attrs);
                }
                None => {
                    positions.insert(key.clone(), hosts.len());
                    hosts.push((key, attrs));
                }
            }
        }

        let graph = build_graph(&hosts, &self.rules, self.config.ip_preference)?;
        info!(
            hosts = hosts.len(),
            groups = graph.groups().count(),
            "inventory resolved"
        );
        Ok(graph)
    }

    /// Resolve and replay the graph into the host runtime's sink
    pub async fn resolve_into(
        &self,
        source: &dyn RecordSource,
        sink: &mut dyn InventorySink,
    ) -> InventoryResult<InventoryGraph> {
        let graph = self.resolve(source).await?;
        graph.emit(sink);
        Ok(graph)
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterValue;
    use crate::source::StaticRecordSource;
    use serde_json::json;

    fn resolver(config: InventoryConfig) -> InventoryResolver {
        InventoryResolver::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_record_skipped_run_continues() {
        let source = StaticRecordSource::new(vec![
            json!({"State": "running"}),
            json!({"VmId": "i-2", "State": "running"}),
        ]);
        let graph = resolver(InventoryConfig::default())
            .resolve(&source)
            .await
            .unwrap();
        assert!(graph.host("i-2").is_some());
        assert_eq!(graph.hosts().count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_host_last_seen_wins() {
        let source = StaticRecordSource::new(vec![
            json!({"VmId": "i-1", "State": "running"}),
            json!({"VmId": "i-1", "State": "stopped"}),
        ]);
        let graph = resolver(InventoryConfig::default())
            .resolve(&source)
            .await
            .unwrap();
        assert_eq!(graph.hosts().count(), 1);
        assert_eq!(
            graph.host("i-1").unwrap().variables()["outscale_state"],
            json!("stopped")
        );
    }

    #[tokio::test]
    async fn test_local_filter_narrows_records() {
        let mut config = InventoryConfig::default();
        config.filters.insert(
            "states".to_string(),
            FilterValue::One("running".to_string()),
        );
        let source = StaticRecordSource::new(vec![
            json!({"VmId": "i-1", "State": "running"}),
            json!({"VmId": "i-2", "State": "stopped"}),
        ]);
        let graph = resolver(config).resolve(&source).await.unwrap();
        assert!(graph.host("i-1").is_some());
        assert!(graph.host("i-2").is_none());
    }

    #[tokio::test]
    async fn test_ip_keyed_hosts() {
        let config = InventoryConfig {
            use_private_ip: true,
            ..Default::default()
        };
        let source = StaticRecordSource::new(vec![
            json!({"VmId": "i-1", "PrivateIp": "10.0.0.4"}),
            // No private IP: cannot be keyed, skipped with a warning
            json!({"VmId": "i-2"}),
        ]);
        let graph = resolver(config).resolve(&source).await.unwrap();
        assert!(graph.host("10.0.0.4").is_some());
        assert_eq!(graph.hosts().count(), 1);
    }

    #[test]
    fn test_configuration_errors_fail_before_fetch() {
        let mut config = InventoryConfig::default();
        config
            .filters
            .insert("flavor".to_string(), FilterValue::One("large".to_string()));
        assert!(InventoryResolver::new(config).is_err());

        let mut config = InventoryConfig::default();
        config
            .compose
            .insert("v".to_string(), "state | nonsense".to_string());
        assert!(InventoryResolver::new(config).is_err());
    }
}

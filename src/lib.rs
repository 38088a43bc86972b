// Copyright (c) 2025 - Cowboy AI, Inc.

//! Outscale VM inventory construction engine
//!
//! Discovers VM inventory from the Outscale cloud API and reshapes the
//! flat record list into a hierarchical group/host graph with per-host
//! variables, driven by a declarative rule set (filters, keyed groups,
//! composed variables).
//!
//! Pipeline: [`cache::FetchCache`] serves raw records from a
//! [`source::RecordSource`] → [`filters::FilterSet`] narrows them →
//! [`record::normalize`] produces per-host attribute maps →
//! [`builder::build_graph`] applies the [`rules::CompiledRules`] through
//! the [`expr`] engine → the resulting [`graph::InventoryGraph`] is
//! replayed into the host runtime's [`graph::InventorySink`].

pub mod builder;
pub mod cache;
pub mod config;
pub mod errors;
pub mod expr;
pub mod filters;
pub mod graph;
pub mod inventory;
pub mod record;
pub mod rules;
pub mod source;

#[cfg(feature = "client")]
pub mod adapters;

// Re-export commonly used types
pub use cache::{Clock, FetchCache, SystemClock};
pub use config::{
    GroupByField, InventoryConfig, IpPreference, KeyedGroupConfig, StaticGroupConfig,
};
pub use errors::{InventoryError, InventoryResult};
pub use expr::{Expression, ExpressionError, Predicate};
pub use filters::{FilterSet, FilterValue};
pub use graph::{InventoryGraph, InventorySink, ALL_GROUP};
pub use inventory::InventoryResolver;
pub use record::{normalize, AttributeMap, RawRecord};
pub use source::{RecordSource, StaticRecordSource};

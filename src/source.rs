// Copyright (c) 2025 - Cowboy AI, Inc.

//! Remote record source boundary
//!
//! The core never talks to the Outscale API directly; it consumes any
//! implementation of [`RecordSource`]. The bundled `client` feature ships
//! a reqwest-based implementation, tests inject static or counting
//! sources.

use async_trait::async_trait;

use crate::errors::InventoryResult;
use crate::filters::FilterSet;
use crate::record::RawRecord;

/// Supplier of raw VM records for a filter set
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch all records matching the filter set. Fails with
    /// [`crate::errors::InventoryError::Transport`] on remote errors;
    /// retry policy, if any, belongs to the implementation.
    async fn fetch_records(&self, filters: &FilterSet) -> InventoryResult<Vec<RawRecord>>;
}

/// A fixed in-memory record source, useful for tests and offline runs
#[derive(Debug, Clone, Default)]
pub struct StaticRecordSource {
    records: Vec<RawRecord>,
}

impl StaticRecordSource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl RecordSource for StaticRecordSource {
    async fn fetch_records(&self, _filters: &FilterSet) -> InventoryResult<Vec<RawRecord>> {
        Ok(self.records.clone())
    }
}

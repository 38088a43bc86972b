// Copyright (c) 2025 - Cowboy AI, Inc.

//! Fetch cache
//!
//! TTL-bounded memoization of the remote record fetch, keyed by the filter
//! set's canonical serialization. The cache is an explicit value with an
//! injected [`Clock`], constructed once per resolution context and passed
//! by reference; there is no ambient global state.
//!
//! Each key owns an async mutex around its slot, so concurrent misses for
//! the same key coalesce: the second caller waits for and reuses the first
//! caller's in-flight result instead of issuing a duplicate remote fetch.
//!
//! A failed fetch never poisons the cache: the error is surfaced to the
//! caller and any previously stored value stays in place for a later
//! retry, but an expired value is never served in its stead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::InventoryResult;
use crate::filters::FilterSet;
use crate::record::RawRecord;
use crate::source::RecordSource;

/// Time source injected into the cache so expiry is testable
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Default)]
struct CacheSlot {
    records: Option<Arc<Vec<RawRecord>>>,
    fetched_at: Option<DateTime<Utc>>,
}

/// TTL-bounded memoization of `RecordSource::fetch_records`
pub struct FetchCache {
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<String, Arc<Mutex<CacheSlot>>>>,
}

impl FetchCache {
    /// Create a cache with the given TTL and the system clock.
    /// A zero TTL disables caching entirely.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a cache with an injected clock
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// A cache that always delegates to the source
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Serve records for the filter set, fetching through `source` on a
    /// miss or after expiry
    pub async fn get_records(
        &self,
        source: &dyn RecordSource,
        filters: &FilterSet,
    ) -> InventoryResult<Arc<Vec<RawRecord>>> {
        if self.ttl.is_zero() {
            return Ok(Arc::new(source.fetch_records(filters).await?));
        }

        let key = filters.canonical_key();
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(key.clone()).or_default().clone()
        };

        // Holding the slot lock across the fetch is what coalesces
        // concurrent misses for this key.
        let mut slot = slot.lock().await;
        let now = self.clock.now();
        if let (Some(records), Some(fetched_at)) = (&slot.records, slot.fetched_at) {
            if now - fetched_at <= self.ttl {
                debug!(key = %key, "fetch cache hit");
                return Ok(records.clone());
            }
            debug!(key = %key, "fetch cache entry expired");
        }

        match source.fetch_records(filters).await {
            Ok(records) => {
                let records = Arc::new(records);
                slot.records = Some(records.clone());
                slot.fetched_at = Some(now);
                debug!(key = %key, count = records.len(), "fetch cache refreshed");
                Ok(records)
            }
            Err(err) => {
                // Keep whatever was stored before for a later retry
                warn!(key = %key, error = %err, "record fetch failed");
                Err(err)
            }
        }
    }

}

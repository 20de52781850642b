//! Trace-result store.
//!
//! Shared by every request handler through [`crate::state::AppState`]. Ids
//! come from an atomic counter and records live in a concurrent map, so
//! parallel traces never contend on a single lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

use sdntrace_core::{TraceRequest, TraceResult};

use crate::schema::trace::serialize_hops;

/// Value of the id counter before the first trace.
pub const TRACE_ID_BASE: u64 = 30000;

/// One finished trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    pub request_id: u64,
    #[serde(serialize_with = "serialize_hops")]
    pub result: TraceResult,
    pub start_time: String,
    pub total_time: String,
    pub request: TraceRequest,
}

/// `H:MM:SS.ffffff`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{}:{:02}:{:02}.{:06}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        elapsed.subsec_micros()
    )
}

pub struct TraceStore {
    records: DashMap<u64, TraceRecord>,
    last_id: AtomicU64,
}

impl TraceStore {
    pub fn new() -> Self {
        TraceStore {
            records: DashMap::new(),
            last_id: AtomicU64::new(TRACE_ID_BASE),
        }
    }

    /// Reserves the next trace id.
    pub fn next_id(&self) -> u64 {
        self.last_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn insert(&self, record: TraceRecord) {
        self.records.insert(record.request_id, record);
    }

    pub fn get(&self, id: u64) -> Option<TraceRecord> {
        self.records.get(&id).map(|record| record.value().clone())
    }

    /// Every record, ordered by id.
    pub fn list(&self) -> Vec<TraceRecord> {
        let mut records: Vec<TraceRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.request_id);
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for TraceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdntrace_core::Dpid;
    use std::sync::Arc;

    fn record(store: &TraceStore) -> TraceRecord {
        TraceRecord {
            request_id: store.next_id(),
            result: Vec::new(),
            start_time: "2024-01-01 00:00:00.000000".to_string(),
            total_time: format_elapsed(Duration::ZERO),
            request: TraceRequest::new(&Dpid::from("00:00:00:00:00:00:00:01"), 1, None),
        }
    }

    #[test]
    fn ids_follow_the_base() {
        let store = TraceStore::new();
        assert_eq!(store.next_id(), 30001);
        assert_eq!(store.next_id(), 30002);
    }

    #[test]
    fn records_are_listed_by_id() {
        let store = TraceStore::new();
        let first = record(&store);
        let second = record(&store);
        store.insert(second.clone());
        store.insert(first.clone());

        assert_eq!(store.get(first.request_id), Some(first.clone()));
        assert_eq!(store.get(1), None);
        let ids: Vec<u64> = store.list().iter().map(|r| r.request_id).collect();
        assert_eq!(ids, vec![first.request_id, second.request_id]);
    }

    #[test]
    fn concurrent_writers_get_distinct_ids() {
        let store = Arc::new(TraceStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let record = record(&store);
                        store.insert(record);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 400);
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(Duration::from_micros(1_500)), "0:00:00.001500");
        assert_eq!(format_elapsed(Duration::from_secs(3725)), "1:02:05.000000");
    }
}

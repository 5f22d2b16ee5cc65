//! memory.rs: process-local history store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;

use super::{
    record_append_outcome, select_recent, Collection, HistoryRecord, HistoryStore, Order,
    StoreError,
};
use crate::scoring::ScoreResult;

/// `Mutex`-guarded vectors per collection. Records are only ever pushed.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<HashMap<Collection, Vec<HistoryRecord>>>,
    available: AtomicBool,
    next_id: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
        }
    }

    /// Simulate an outage (`false`) or recovery (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.inner
            .lock()
            .map(|m| m.get(&collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::StoreUnavailable(
                "memory store marked unavailable".into(),
            ))
        }
    }

    fn append_sync(
        &self,
        result: &ScoreResult,
        is_simulated: bool,
    ) -> Result<HistoryRecord, StoreError> {
        self.check_available()?;

        let mut map = self
            .inner
            .lock()
            .map_err(|_| StoreError::StoreUnavailable("memory store lock poisoned".into()))?;
        let log = map.entry(Collection::for_source(is_simulated)).or_default();

        // Keep the store clock non-decreasing within a collection.
        let now = Utc::now();
        let ts = log.last().map_or(now, |last| last.timestamp.max(now));
        let id = format!("mem-{}", self.next_id.fetch_add(1, Ordering::Relaxed));

        let record = HistoryRecord::build(result, is_simulated, id, ts)?;
        log.push(record.clone());
        Ok(record)
    }
}

#[async_trait::async_trait]
impl HistoryStore for MemoryStore {
    async fn append(
        &self,
        result: &ScoreResult,
        is_simulated: bool,
    ) -> Result<HistoryRecord, StoreError> {
        let res = self.append_sync(result, is_simulated);
        record_append_outcome(self.name(), &res);
        res
    }

    async fn list_recent(
        &self,
        collection: Collection,
        limit: usize,
        order: Order,
    ) -> Result<Vec<HistoryRecord>, StoreError> {
        self.check_available()?;
        let records = {
            let map = self
                .inner
                .lock()
                .map_err(|_| StoreError::StoreUnavailable("memory store lock poisoned".into()))?;
            map.get(&collection).cloned().unwrap_or_default()
        };
        Ok(select_recent(records, limit, order))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

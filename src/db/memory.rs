//! In-memory store double used by flow and route tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{StoreError, StoredTrendRecord, TrendRecord, TrendStore};

pub struct MemoryTrendStore {
    records: Mutex<Vec<TrendRecord>>,
    connected: AtomicBool,
    fail_save: bool,
}

impl MemoryTrendStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            fail_save: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_save: true,
            ..Self::new()
        }
    }

    pub fn saved(&self) -> Vec<TrendRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl Default for MemoryTrendStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrendStore for MemoryTrendStore {
    async fn connect(&self) -> Result<(), StoreError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn save(&self, record: &TrendRecord) -> Result<StoredTrendRecord, StoreError> {
        if self.fail_save {
            return Err(StoreError::NotConnected);
        }
        let mut records = self.records.lock().unwrap();
        records.push(record.clone());
        Ok(StoredTrendRecord {
            id: records.len() as i64,
            scrape_id: record.scrape_id,
            trend1: record.trend1.clone(),
            trend2: record.trend2.clone(),
            trend3: record.trend3.clone(),
            trend4: record.trend4.clone(),
            trend5: record.trend5.clone(),
            captured_at: record.captured_at,
            ip_address: record.ip_address.clone(),
            revision: 0,
        })
    }
}

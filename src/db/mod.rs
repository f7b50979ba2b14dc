//! Persistence for scraped trend records, backed by Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;
use uuid::Uuid;

use crate::trends::{EMPTY_SLOT, TREND_SLOTS};

#[cfg(test)]
pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store used before connect")]
    NotConnected,

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// One scrape result, ready to persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendRecord {
    pub scrape_id: Uuid,
    pub trend1: String,
    pub trend2: String,
    pub trend3: String,
    pub trend4: String,
    pub trend5: String,
    #[serde(rename = "timestamp")]
    pub captured_at: DateTime<Utc>,
    pub ip_address: String,
}

impl TrendRecord {
    /// Builds a record from however many topics were extracted. Missing
    /// slots are filled with the `N/A` sentinel, extras are dropped.
    pub fn new(topics: Vec<String>, ip_address: String) -> Self {
        let mut slots = topics;
        slots.resize(TREND_SLOTS, EMPTY_SLOT.to_string());
        let mut slots = slots.into_iter();
        Self {
            scrape_id: Uuid::new_v4(),
            trend1: slots.next().unwrap(),
            trend2: slots.next().unwrap(),
            trend3: slots.next().unwrap(),
            trend4: slots.next().unwrap(),
            trend5: slots.next().unwrap(),
            captured_at: Utc::now(),
            ip_address,
        }
    }
}

/// A [`TrendRecord`] as it came back from the database.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoredTrendRecord {
    pub id: i64,
    pub scrape_id: Uuid,
    pub trend1: String,
    pub trend2: String,
    pub trend3: String,
    pub trend4: String,
    pub trend5: String,
    #[serde(rename = "timestamp")]
    pub captured_at: DateTime<Utc>,
    pub ip_address: String,
    pub revision: i32,
}

#[async_trait]
pub trait TrendStore: Send + Sync {
    /// Establishes the connection if not already up. Safe to call before
    /// every scrape.
    async fn connect(&self) -> Result<(), StoreError>;

    async fn is_connected(&self) -> bool;

    async fn save(&self, record: &TrendRecord) -> Result<StoredTrendRecord, StoreError>;
}

pub struct PgTrendStore {
    database_url: String,
    pool: OnceCell<PgPool>,
}

impl PgTrendStore {
    pub fn new(database_url: String) -> Self {
        Self {
            database_url,
            pool: OnceCell::new(),
        }
    }

    async fn init_pool(&self) -> Result<PgPool, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&self.database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database connected and migrations applied");
        Ok(pool)
    }
}

#[async_trait]
impl TrendStore for PgTrendStore {
    async fn connect(&self) -> Result<(), StoreError> {
        self.pool.get_or_try_init(|| self.init_pool()).await?;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        match self.pool.get() {
            Some(pool) => !pool.is_closed(),
            None => false,
        }
    }

    async fn save(&self, record: &TrendRecord) -> Result<StoredTrendRecord, StoreError> {
        let pool = self.pool.get().ok_or(StoreError::NotConnected)?;
        let stored = sqlx::query_as::<_, StoredTrendRecord>(
            r#"
            INSERT INTO trends
                (scrape_id, trend1, trend2, trend3, trend4, trend5, captured_at, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, scrape_id, trend1, trend2, trend3, trend4, trend5,
                      captured_at, ip_address, revision
            "#,
        )
        .bind(record.scrape_id)
        .bind(&record.trend1)
        .bind(&record.trend2)
        .bind(&record.trend3)
        .bind(&record.trend4)
        .bind(&record.trend5)
        .bind(record.captured_at)
        .bind(&record.ip_address)
        .fetch_one(pool)
        .await?;
        Ok(stored)
    }
}

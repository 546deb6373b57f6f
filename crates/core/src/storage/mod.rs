use crate::domain::screen::FilterSpec;
use crate::domain::stock::{
    FundamentalSnapshot, StockDescriptor, StockDetail, StockWithLatest, UpsertOutcome,
};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};

pub mod memory;
pub mod postgres;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Ledger entry for one scrape-trigger invocation.
#[derive(Debug, Clone)]
pub struct ScrapeRun {
    pub as_of_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub status: &'static str,
    pub error: Option<String>,
    pub total_scraped: u64,
    pub stocks_created: u64,
    pub stocks_updated: u64,
    pub fundamentals_written: u64,
}

#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Inserts the descriptor, or overwrites name/sector/subsector/flag of an existing ticker.
    async fn upsert_stock(&self, stock: &StockDescriptor) -> anyhow::Result<UpsertOutcome>;

    /// Inserts the snapshot, or overwrites every metric of the existing (ticker, date) row.
    async fn upsert_fundamental(&self, snapshot: &FundamentalSnapshot) -> anyhow::Result<()>;

    async fn find_stock(&self, ticker: &str) -> anyhow::Result<Option<StockDescriptor>>;

    /// Descriptor plus history, oldest first.
    async fn get_stock(&self, ticker: &str) -> anyhow::Result<Option<StockDetail>>;

    /// Descriptors matching the search and state-owned predicates of `filter`, each joined to its
    /// most recent snapshot, ordered by ticker. Tickers without snapshots are left out.
    async fn get_stocks(&self, filter: &FilterSpec) -> anyhow::Result<Vec<StockWithLatest>>;

    async fn record_scrape_run(&self, run: &ScrapeRun) -> anyhow::Result<()>;
}

pub(crate) fn matches_search(stock: &StockDescriptor, term: &str) -> bool {
    let term = term.to_lowercase();
    stock.ticker.to_lowercase().contains(&term) || stock.name.to_lowercase().contains(&term)
}

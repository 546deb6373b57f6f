use crate::domain::stock::{ScrapedRecord, UpsertOutcome};
use crate::error::ServiceError;
use crate::ingest::classify::is_state_owned;
use crate::ingest::source::SourceClient;
use crate::ingest::table::extract_records_from_html;
use crate::storage::{ScrapeRun, SnapshotStore};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeSummary {
    pub total_scraped: u64,
    pub stocks_created: u64,
    pub stocks_updated: u64,
    pub fundamentals_written: u64,
}

/// Fetches the source page and runs the full extract, classify and upsert pipeline.
pub async fn run_scrape(
    store: &dyn SnapshotStore,
    source: &dyn SourceClient,
    as_of_date: NaiveDate,
) -> anyhow::Result<ScrapeSummary> {
    let html = match source.fetch_results_html().await {
        Ok(html) => html,
        Err(err) => {
            record_failure(store, as_of_date, source.source_name(), &err).await;
            return Err(err);
        }
    };

    scrape_html(store, &html, as_of_date, source.source_name()).await
}

/// Same as [`run_scrape`] over markup that was already fetched.
pub async fn scrape_html(
    store: &dyn SnapshotStore,
    html: &str,
    as_of_date: NaiveDate,
    source_name: &str,
) -> anyhow::Result<ScrapeSummary> {
    let records = extract_records_from_html(html);
    if records.is_empty() {
        let err = anyhow::Error::new(ServiceError::EmptyScrape);
        record_failure(store, as_of_date, source_name, &err).await;
        return Err(err);
    }

    tracing::info!(%as_of_date, records = records.len(), "extracted source rows");
    let (summary, last_error) = upsert_batch(store, &records, as_of_date).await;

    if summary.fundamentals_written == 0 {
        let cause = last_error.map_or_else(|| "no upsert attempted".to_string(), |e| format!("{e:#}"));
        let err = anyhow::Error::new(ServiceError::NothingWritten {
            attempted: summary.total_scraped,
            cause,
        });
        record_failure(store, as_of_date, source_name, &err).await;
        return Err(err);
    }

    let run = ScrapeRun {
        as_of_date,
        generated_at: Utc::now(),
        source: source_name.to_string(),
        status: "success",
        error: None,
        total_scraped: summary.total_scraped,
        stocks_created: summary.stocks_created,
        stocks_updated: summary.stocks_updated,
        fundamentals_written: summary.fundamentals_written,
    };
    if let Err(err) = store.record_scrape_run(&run).await {
        tracing::warn!(error = %err, "failed to record scrape run");
    }

    tracing::info!(
        %as_of_date,
        total = summary.total_scraped,
        created = summary.stocks_created,
        updated = summary.stocks_updated,
        fundamentals = summary.fundamentals_written,
        "scrape finished"
    );
    Ok(summary)
}

/// Upserts each record independently. A failing ticker is logged and counted nowhere; the most
/// recent failure is handed back.
async fn upsert_batch(
    store: &dyn SnapshotStore,
    records: &[ScrapedRecord],
    as_of_date: NaiveDate,
) -> (ScrapeSummary, Option<anyhow::Error>) {
    let mut summary = ScrapeSummary {
        total_scraped: records.len() as u64,
        ..Default::default()
    };
    let mut failures: usize = 0;
    let mut last_error: Option<anyhow::Error> = None;
    let total = records.len();

    for (idx, record) in records.iter().enumerate() {
        match upsert_one(store, record, as_of_date).await {
            Ok(UpsertOutcome::Created) => {
                summary.stocks_created += 1;
                summary.fundamentals_written += 1;
            }
            Ok(UpsertOutcome::Updated) => {
                summary.stocks_updated += 1;
                summary.fundamentals_written += 1;
            }
            Err(err) => {
                failures += 1;
                tracing::warn!(
                    ticker = %record.ticker,
                    failure_count = failures,
                    error = %err,
                    "upsert failed; skipping ticker"
                );
                last_error = Some(err);
            }
        }

        let n = idx + 1;
        if n % PROGRESS_EVERY == 0 || n == total {
            tracing::debug!(processed = n, total, failures, "scrape upsert progress");
        }
    }

    (summary, last_error)
}

async fn upsert_one(
    store: &dyn SnapshotStore,
    record: &ScrapedRecord,
    as_of_date: NaiveDate,
) -> anyhow::Result<UpsertOutcome> {
    let state_owned = is_state_owned(&record.name, &record.ticker);
    let outcome = store.upsert_stock(&record.descriptor(state_owned)).await?;
    store.upsert_fundamental(&record.snapshot(as_of_date)).await?;
    Ok(outcome)
}

async fn record_failure(
    store: &dyn SnapshotStore,
    as_of_date: NaiveDate,
    source_name: &str,
    err: &anyhow::Error,
) {
    let run = ScrapeRun {
        as_of_date,
        generated_at: Utc::now(),
        source: source_name.to_string(),
        status: "failure",
        error: Some(format!("{err:#}")),
        total_scraped: 0,
        stocks_created: 0,
        stocks_updated: 0,
        fundamentals_written: 0,
    };
    if let Err(e) = store.record_scrape_run(&run).await {
        tracing::warn!(error = %e, "failed to record scrape run");
    }
    tracing::error!(%as_of_date, error = %err, "scrape failed");
}

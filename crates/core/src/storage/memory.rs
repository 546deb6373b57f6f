use crate::domain::screen::FilterSpec;
use crate::domain::stock::{
    FundamentalSnapshot, StockDescriptor, StockDetail, StockWithLatest, UpsertOutcome,
};
use crate::storage::{matches_search, ScrapeRun, SnapshotStore};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

/// Process-local store with the same upsert and ordering rules as the Postgres one.
/// Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: tokio::sync::Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    stocks: BTreeMap<String, StockDescriptor>,
    // (ticker, date) -> (insertion id, snapshot). The id survives updates, like a serial key.
    fundamentals: HashMap<(String, NaiveDate), (u64, FundamentalSnapshot)>,
    next_id: u64,
    runs: Vec<ScrapeRun>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fundamentals_len(&self) -> usize {
        self.inner.lock().await.fundamentals.len()
    }

    pub async fn scrape_runs(&self) -> Vec<ScrapeRun> {
        self.inner.lock().await.runs.clone()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemoryStore {
    async fn upsert_stock(&self, stock: &StockDescriptor) -> anyhow::Result<UpsertOutcome> {
        let mut inner = self.inner.lock().await;
        let outcome = match inner.stocks.insert(stock.ticker.clone(), stock.clone()) {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Created,
        };
        Ok(outcome)
    }

    async fn upsert_fundamental(&self, snapshot: &FundamentalSnapshot) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        anyhow::ensure!(
            inner.stocks.contains_key(&snapshot.ticker),
            "upsert fundamentals failed: unknown ticker {}",
            snapshot.ticker
        );

        let key = (snapshot.ticker.clone(), snapshot.as_of_date);
        let existing = inner.fundamentals.get(&key).map(|(id, _)| *id);
        let id = match existing {
            Some(id) => id,
            None => {
                inner.next_id += 1;
                inner.next_id
            }
        };
        inner.fundamentals.insert(key, (id, snapshot.clone()));
        Ok(())
    }

    async fn find_stock(&self, ticker: &str) -> anyhow::Result<Option<StockDescriptor>> {
        Ok(self.inner.lock().await.stocks.get(ticker).cloned())
    }

    async fn get_stock(&self, ticker: &str) -> anyhow::Result<Option<StockDetail>> {
        let inner = self.inner.lock().await;
        let Some(stock) = inner.stocks.get(ticker).cloned() else {
            return Ok(None);
        };

        let mut history: Vec<FundamentalSnapshot> = inner
            .fundamentals
            .values()
            .filter(|(_, s)| s.ticker == stock.ticker)
            .map(|(_, s)| s.clone())
            .collect();
        history.sort_by_key(|s| s.as_of_date);

        Ok(Some(StockDetail { stock, history }))
    }

    async fn get_stocks(&self, filter: &FilterSpec) -> anyhow::Result<Vec<StockWithLatest>> {
        let inner = self.inner.lock().await;

        let mut latest: HashMap<&str, &(u64, FundamentalSnapshot)> = HashMap::new();
        for entry in inner.fundamentals.values() {
            let cur = latest.entry(entry.1.ticker.as_str()).or_insert(entry);
            if (entry.1.as_of_date, entry.0) > (cur.1.as_of_date, cur.0) {
                *cur = entry;
            }
        }

        let search = filter.search_term();
        let out = inner
            .stocks
            .values()
            .filter(|s| search.map_or(true, |t| matches_search(s, t)))
            .filter(|s| !(filter.exclude_state_owned && s.is_state_owned))
            .filter_map(|s| {
                latest.get(s.ticker.as_str()).map(|(_, snap)| StockWithLatest {
                    stock: s.clone(),
                    latest: snap.clone(),
                })
            })
            .collect();
        Ok(out)
    }

    async fn record_scrape_run(&self, run: &ScrapeRun) -> anyhow::Result<()> {
        self.inner.lock().await.runs.push(run.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stock::UNKNOWN_SECTOR;

    fn stock(ticker: &str, name: &str, soe: bool) -> StockDescriptor {
        StockDescriptor {
            ticker: ticker.to_string(),
            name: name.to_string(),
            sector: UNKNOWN_SECTOR.to_string(),
            subsector: None,
            is_state_owned: soe,
        }
    }

    fn snap(ticker: &str, day: u32, roe: Option<f64>) -> FundamentalSnapshot {
        FundamentalSnapshot {
            ticker: ticker.to_string(),
            as_of_date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            pl: Some(10.0),
            roe,
            pvp: Some(1.5),
            dividend_yield: Some(4.0),
            net_profit: None,
            ebit_ev: Some(0.1),
            roic: Some(12.0),
        }
    }

    #[tokio::test]
    async fn upsert_stock_reports_created_then_updated() {
        let store = MemoryStore::new();
        let out = store.upsert_stock(&stock("WEGE3", "Weg", false)).await.unwrap();
        assert_eq!(out, UpsertOutcome::Created);

        let out = store
            .upsert_stock(&stock("WEGE3", "Weg S.A.", false))
            .await
            .unwrap();
        assert_eq!(out, UpsertOutcome::Updated);

        let found = store.find_stock("WEGE3").await.unwrap().unwrap();
        assert_eq!(found.name, "Weg S.A.");
    }

    #[tokio::test]
    async fn upsert_fundamental_is_idempotent() {
        let store = MemoryStore::new();
        store.upsert_stock(&stock("WEGE3", "Weg", false)).await.unwrap();

        let s = snap("WEGE3", 2, Some(30.0));
        store.upsert_fundamental(&s).await.unwrap();
        store.upsert_fundamental(&s).await.unwrap();
        assert_eq!(store.fundamentals_len().await, 1);

        let detail = store.get_stock("WEGE3").await.unwrap().unwrap();
        assert_eq!(detail.history, vec![s]);
    }

    #[tokio::test]
    async fn same_day_rescrape_overwrites_values() {
        let store = MemoryStore::new();
        store.upsert_stock(&stock("WEGE3", "Weg", false)).await.unwrap();
        store.upsert_fundamental(&snap("WEGE3", 2, Some(30.0))).await.unwrap();
        store.upsert_fundamental(&snap("WEGE3", 2, Some(31.5))).await.unwrap();

        let detail = store.get_stock("WEGE3").await.unwrap().unwrap();
        assert_eq!(detail.history.len(), 1);
        assert_eq!(detail.history[0].roe, Some(31.5));
    }

    #[tokio::test]
    async fn rejects_snapshot_for_unknown_ticker() {
        let store = MemoryStore::new();
        assert!(store.upsert_fundamental(&snap("XPTO3", 2, None)).await.is_err());
    }

    #[tokio::test]
    async fn history_is_ascending_and_latest_is_most_recent() {
        let store = MemoryStore::new();
        store.upsert_stock(&stock("WEGE3", "Weg", false)).await.unwrap();
        store.upsert_fundamental(&snap("WEGE3", 5, Some(3.0))).await.unwrap();
        store.upsert_fundamental(&snap("WEGE3", 1, Some(1.0))).await.unwrap();
        store.upsert_fundamental(&snap("WEGE3", 3, Some(2.0))).await.unwrap();

        let detail = store.get_stock("WEGE3").await.unwrap().unwrap();
        let days: Vec<u32> = detail
            .history
            .iter()
            .map(|s| chrono::Datelike::day(&s.as_of_date))
            .collect();
        assert_eq!(days, vec![1, 3, 5]);

        let rows = store.get_stocks(&FilterSpec::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].latest.roe, Some(3.0));
    }

    #[tokio::test]
    async fn get_stocks_applies_search_and_state_owned_and_skips_empty_history() {
        let store = MemoryStore::new();
        store.upsert_stock(&stock("PETR4", "Petrobras", true)).await.unwrap();
        store.upsert_stock(&stock("PRIO3", "PetroRio", false)).await.unwrap();
        store.upsert_stock(&stock("WEGE3", "Weg", false)).await.unwrap();
        store.upsert_stock(&stock("NEWS3", "No History", false)).await.unwrap();
        for t in ["PETR4", "PRIO3", "WEGE3"] {
            store.upsert_fundamental(&snap(t, 2, Some(10.0))).await.unwrap();
        }

        let all = store.get_stocks(&FilterSpec::default()).await.unwrap();
        let tickers: Vec<&str> = all.iter().map(|r| r.stock.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["PETR4", "PRIO3", "WEGE3"]);

        let filter = FilterSpec {
            search: Some("PETRO".to_string()),
            exclude_state_owned: true,
            ..Default::default()
        };
        let rows = store.get_stocks(&filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stock.ticker, "PRIO3");
    }

    #[tokio::test]
    async fn unknown_ticker_is_none() {
        let store = MemoryStore::new();
        assert!(store.get_stock("NOPE3").await.unwrap().is_none());
    }
}

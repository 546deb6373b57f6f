//! Operations exposed to the HTTP and CLI front-ends.

use crate::domain::screen::{FilterSpec, RankedStock};
use crate::domain::stock::{
    normalize_ticker, FundamentalSnapshot, NewFundamental, NewStock, StockDescriptor, StockDetail,
    UpsertOutcome,
};
use crate::error::ServiceError;
use crate::rank::filter_and_rank;
use crate::storage::SnapshotStore;

pub async fn list_stocks(
    store: &dyn SnapshotStore,
    filter: &FilterSpec,
) -> anyhow::Result<Vec<RankedStock>> {
    let rows = store.get_stocks(filter).await?;
    Ok(filter_and_rank(rows, filter))
}

/// Descriptor and ascending history. Unknown tickers are `ServiceError::NotFound`.
pub async fn stock_detail(store: &dyn SnapshotStore, ticker: &str) -> anyhow::Result<StockDetail> {
    let ticker = normalize_ticker(ticker)?;
    let Some(detail) = store.get_stock(&ticker).await? else {
        return Err(ServiceError::NotFound(ticker).into());
    };
    Ok(detail)
}

pub async fn create_stock(
    store: &dyn SnapshotStore,
    input: NewStock,
) -> anyhow::Result<(StockDescriptor, UpsertOutcome)> {
    let stock = input.validate()?;
    let outcome = store.upsert_stock(&stock).await?;
    tracing::info!(ticker = %stock.ticker, ?outcome, "stock saved");
    Ok((stock, outcome))
}

pub async fn create_fundamental(
    store: &dyn SnapshotStore,
    input: NewFundamental,
) -> anyhow::Result<FundamentalSnapshot> {
    let snapshot = input.validate()?;
    if store.find_stock(&snapshot.ticker).await?.is_none() {
        return Err(ServiceError::NotFound(snapshot.ticker).into());
    }
    store.upsert_fundamental(&snapshot).await?;
    tracing::info!(ticker = %snapshot.ticker, as_of_date = %snapshot.as_of_date, "fundamental saved");
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::screen::SortMode;
    use crate::storage::memory::MemoryStore;
    use chrono::NaiveDate;

    fn new_stock(ticker: &str) -> NewStock {
        NewStock {
            ticker: ticker.to_string(),
            name: format!("{ticker} S.A."),
            sector: Some("Bens Industriais".to_string()),
            subsector: None,
            is_state_owned: false,
        }
    }

    fn new_fundamental(ticker: &str, roic: f64, ebit_ev: f64) -> NewFundamental {
        NewFundamental {
            ticker: ticker.to_string(),
            as_of_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            pl: Some(10.0),
            roe: Some(18.0),
            pvp: Some(1.5),
            dividend_yield: Some(3.0),
            net_profit: None,
            ebit_ev: Some(ebit_ev),
            roic: Some(roic),
        }
    }

    #[tokio::test]
    async fn create_then_query_with_magic_formula() {
        let store = MemoryStore::new();
        for (t, roic, ey) in [("AAAA3", 10.0, 0.05), ("BBBB3", 30.0, 0.20), ("CCCC3", 20.0, 0.10)] {
            create_stock(&store, new_stock(t)).await.unwrap();
            create_fundamental(&store, new_fundamental(t, roic, ey)).await.unwrap();
        }

        let filter = FilterSpec {
            sort: SortMode::MagicFormula,
            ..Default::default()
        };
        let out = list_stocks(&store, &filter).await.unwrap();
        let tickers: Vec<&str> = out.iter().map(|r| r.stock.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["BBBB3", "CCCC3", "AAAA3"]);
    }

    #[tokio::test]
    async fn detail_of_unknown_ticker_is_not_found() {
        let store = MemoryStore::new();
        let err = stock_detail(&store, "nope3").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::NotFound(t)) if t == "NOPE3"
        ));
    }

    #[tokio::test]
    async fn fundamental_for_unknown_ticker_is_rejected() {
        let store = MemoryStore::new();
        let err = create_fundamental(&store, new_fundamental("WEGE3", 1.0, 0.1))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn invalid_payload_is_rejected_before_store() {
        let store = MemoryStore::new();
        let mut input = new_stock("WEGE3");
        input.ticker = "WE GE3".to_string();
        let err = create_stock(&store, input).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ServiceError>(),
            Some(ServiceError::Invalid { field: "ticker", .. })
        ));
        assert!(store.find_stock("WEGE3").await.unwrap().is_none());
    }
}

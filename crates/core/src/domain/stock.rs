use crate::error::ServiceError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_SECTOR: &str = "Unknown";
const MAX_TICKER_LEN: usize = 12;

/// Descriptive record of a listed company, keyed by ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockDescriptor {
    pub ticker: String,
    pub name: String,
    pub sector: String,
    pub subsector: Option<String>,
    pub is_state_owned: bool,
}

/// One fundamentals reading for a ticker on a given date.
///
/// `ebit_ev` is the earnings yield (the inverse of the EV/EBIT the source publishes).
/// `net_profit` is filled from the source's net margin column; it is a proxy, not an absolute
/// profit figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    pub ticker: String,
    pub as_of_date: NaiveDate,
    pub pl: Option<f64>,
    pub roe: Option<f64>,
    pub pvp: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub net_profit: Option<f64>,
    pub ebit_ev: Option<f64>,
    pub roic: Option<f64>,
}

/// A descriptor with its full history, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct StockDetail {
    #[serde(flatten)]
    pub stock: StockDescriptor,
    pub history: Vec<FundamentalSnapshot>,
}

/// A descriptor joined with its most recent snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StockWithLatest {
    pub stock: StockDescriptor,
    pub latest: FundamentalSnapshot,
}

/// Outcome of `upsert_stock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// One row as read off the results table, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedRecord {
    pub ticker: String,
    pub name: String,
    pub sector: String,
    pub pl: Option<f64>,
    pub pvp: Option<f64>,
    pub dividend_yield: Option<f64>,
    /// EV/EBIT exactly as published.
    pub ev_ebit: Option<f64>,
    pub net_profit: Option<f64>,
    pub roic: Option<f64>,
    pub roe: Option<f64>,
    pub liquidity: Option<f64>,
}

impl ScrapedRecord {
    pub fn descriptor(&self, is_state_owned: bool) -> StockDescriptor {
        StockDescriptor {
            ticker: self.ticker.clone(),
            name: self.name.clone(),
            sector: self.sector.clone(),
            subsector: None,
            is_state_owned,
        }
    }

    pub fn snapshot(&self, as_of_date: NaiveDate) -> FundamentalSnapshot {
        FundamentalSnapshot {
            ticker: self.ticker.clone(),
            as_of_date,
            pl: self.pl,
            roe: self.roe,
            pvp: self.pvp,
            dividend_yield: self.dividend_yield,
            net_profit: self.net_profit,
            ebit_ev: earnings_yield(self.ev_ebit),
            roic: self.roic,
        }
    }
}

/// EBIT/EV from the published EV/EBIT. Zero has no inverse and maps to `None`.
pub fn earnings_yield(ev_ebit: Option<f64>) -> Option<f64> {
    ev_ebit.filter(|v| *v != 0.0).map(|v| 1.0 / v)
}

/// Payload for manual descriptor entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewStock {
    pub ticker: String,
    pub name: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub subsector: Option<String>,
    #[serde(default)]
    pub is_state_owned: bool,
}

impl NewStock {
    pub fn validate(self) -> Result<StockDescriptor, ServiceError> {
        let ticker = normalize_ticker(&self.ticker)?;

        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::invalid("name", "must be non-empty"));
        }

        let sector = self
            .sector
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_SECTOR.to_string());

        let subsector = self
            .subsector
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(StockDescriptor {
            ticker,
            name,
            sector,
            subsector,
            is_state_owned: self.is_state_owned,
        })
    }
}

/// Payload for manual snapshot entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewFundamental {
    pub ticker: String,
    pub as_of_date: NaiveDate,
    #[serde(default)]
    pub pl: Option<f64>,
    #[serde(default)]
    pub roe: Option<f64>,
    #[serde(default)]
    pub pvp: Option<f64>,
    #[serde(default)]
    pub dividend_yield: Option<f64>,
    #[serde(default)]
    pub net_profit: Option<f64>,
    #[serde(default)]
    pub ebit_ev: Option<f64>,
    #[serde(default)]
    pub roic: Option<f64>,
}

impl NewFundamental {
    pub fn validate(self) -> Result<FundamentalSnapshot, ServiceError> {
        let ticker = normalize_ticker(&self.ticker)?;

        for (field, value) in [
            ("pl", self.pl),
            ("roe", self.roe),
            ("pvp", self.pvp),
            ("dividend_yield", self.dividend_yield),
            ("net_profit", self.net_profit),
            ("ebit_ev", self.ebit_ev),
            ("roic", self.roic),
        ] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(ServiceError::invalid(field, "must be a finite number"));
                }
            }
        }

        Ok(FundamentalSnapshot {
            ticker,
            as_of_date: self.as_of_date,
            pl: self.pl,
            roe: self.roe,
            pvp: self.pvp,
            dividend_yield: self.dividend_yield,
            net_profit: self.net_profit,
            ebit_ev: self.ebit_ev,
            roic: self.roic,
        })
    }
}

pub fn normalize_ticker(raw: &str) -> Result<String, ServiceError> {
    let ticker = raw.trim().to_ascii_uppercase();
    if ticker.is_empty() {
        return Err(ServiceError::invalid("ticker", "must be non-empty"));
    }
    if ticker.len() > MAX_TICKER_LEN {
        return Err(ServiceError::invalid(
            "ticker",
            format!("must be at most {MAX_TICKER_LEN} characters"),
        ));
    }
    if !ticker.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ServiceError::invalid("ticker", "must be alphanumeric"));
    }
    Ok(ticker)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ev_ebit: Option<f64>) -> ScrapedRecord {
        ScrapedRecord {
            ticker: "WEGE3".to_string(),
            name: "Weg S.A.".to_string(),
            sector: UNKNOWN_SECTOR.to_string(),
            pl: Some(25.5),
            pvp: Some(8.1),
            dividend_yield: Some(1.7),
            ev_ebit,
            net_profit: Some(16.2),
            roic: Some(27.3),
            roe: Some(30.9),
            liquidity: Some(1.0e8),
        }
    }

    #[test]
    fn snapshot_inverts_ev_ebit() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let snap = record(Some(20.0)).snapshot(d);
        assert_eq!(snap.ebit_ev, Some(0.05));
        assert_eq!(snap.as_of_date, d);
        assert_eq!(snap.net_profit, Some(16.2));

        assert_eq!(record(Some(0.0)).snapshot(d).ebit_ev, None);
        assert_eq!(record(None).snapshot(d).ebit_ev, None);
    }

    #[test]
    fn new_stock_normalizes_fields() {
        let stock = NewStock {
            ticker: " petr4 ".to_string(),
            name: " Petrobras ".to_string(),
            sector: Some("  ".to_string()),
            subsector: Some("".to_string()),
            is_state_owned: true,
        }
        .validate()
        .unwrap();

        assert_eq!(stock.ticker, "PETR4");
        assert_eq!(stock.name, "Petrobras");
        assert_eq!(stock.sector, UNKNOWN_SECTOR);
        assert_eq!(stock.subsector, None);
    }

    #[test]
    fn rejects_bad_tickers_and_names() {
        assert!(normalize_ticker("").is_err());
        assert!(normalize_ticker("PETR-4").is_err());
        assert!(normalize_ticker("ABCDEFGHIJKLM").is_err());

        let err = NewStock {
            ticker: "VALE3".to_string(),
            name: "   ".to_string(),
            sector: None,
            subsector: None,
            is_state_owned: false,
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ServiceError::Invalid { field: "name", .. }));
    }

    #[test]
    fn new_fundamental_rejects_non_finite_values() {
        let err = NewFundamental {
            ticker: "VALE3".to_string(),
            as_of_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            pl: Some(f64::NAN),
            roe: None,
            pvp: None,
            dividend_yield: None,
            net_profit: None,
            ebit_ev: None,
            roic: None,
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ServiceError::Invalid { field: "pl", .. }));
    }
}

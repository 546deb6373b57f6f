use crate::domain::screen::FilterSpec;
use crate::domain::stock::{
    FundamentalSnapshot, StockDescriptor, StockDetail, StockWithLatest, UpsertOutcome,
};
use crate::storage::{ScrapeRun, SnapshotStore};
use anyhow::Context;
use chrono::NaiveDate;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: sqlx::PgPool,
}

impl PgStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    ticker: String,
    name: String,
    sector: String,
    subsector: Option<String>,
    is_state_owned: bool,
}

impl From<StockRow> for StockDescriptor {
    fn from(r: StockRow) -> Self {
        StockDescriptor {
            ticker: r.ticker,
            name: r.name,
            sector: r.sector,
            subsector: r.subsector,
            is_state_owned: r.is_state_owned,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FundamentalRow {
    ticker: String,
    as_of_date: NaiveDate,
    pl: Option<f64>,
    roe: Option<f64>,
    pvp: Option<f64>,
    dividend_yield: Option<f64>,
    net_profit: Option<f64>,
    ebit_ev: Option<f64>,
    roic: Option<f64>,
}

impl From<FundamentalRow> for FundamentalSnapshot {
    fn from(r: FundamentalRow) -> Self {
        FundamentalSnapshot {
            ticker: r.ticker,
            as_of_date: r.as_of_date,
            pl: r.pl,
            roe: r.roe,
            pvp: r.pvp,
            dividend_yield: r.dividend_yield,
            net_profit: r.net_profit,
            ebit_ev: r.ebit_ev,
            roic: r.roic,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LatestRow {
    #[sqlx(flatten)]
    stock: StockRow,
    as_of_date: NaiveDate,
    pl: Option<f64>,
    roe: Option<f64>,
    pvp: Option<f64>,
    dividend_yield: Option<f64>,
    net_profit: Option<f64>,
    ebit_ev: Option<f64>,
    roic: Option<f64>,
}

impl From<LatestRow> for StockWithLatest {
    fn from(r: LatestRow) -> Self {
        let latest = FundamentalSnapshot {
            ticker: r.stock.ticker.clone(),
            as_of_date: r.as_of_date,
            pl: r.pl,
            roe: r.roe,
            pvp: r.pvp,
            dividend_yield: r.dividend_yield,
            net_profit: r.net_profit,
            ebit_ev: r.ebit_ev,
            roic: r.roic,
        };
        StockWithLatest {
            stock: r.stock.into(),
            latest,
        }
    }
}

#[async_trait::async_trait]
impl SnapshotStore for PgStore {
    async fn upsert_stock(&self, stock: &StockDescriptor) -> anyhow::Result<UpsertOutcome> {
        // xmax is zero only on a freshly inserted tuple.
        let (inserted,): (bool,) = sqlx::query_as(
            "INSERT INTO stocks (ticker, name, sector, subsector, is_state_owned) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (ticker) DO UPDATE \
               SET name = EXCLUDED.name, sector = EXCLUDED.sector, subsector = EXCLUDED.subsector, \
                   is_state_owned = EXCLUDED.is_state_owned, updated_at = now() \
             RETURNING (xmax = 0) AS inserted",
        )
        .persistent(false)
        .bind(&stock.ticker)
        .bind(&stock.name)
        .bind(&stock.sector)
        .bind(&stock.subsector)
        .bind(stock.is_state_owned)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("upsert stocks failed (ticker={})", stock.ticker))?;

        Ok(if inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn upsert_fundamental(&self, s: &FundamentalSnapshot) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO fundamentals \
               (ticker, as_of_date, pl, roe, pvp, dividend_yield, net_profit, ebit_ev, roic) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (ticker, as_of_date) DO UPDATE \
               SET pl = EXCLUDED.pl, roe = EXCLUDED.roe, pvp = EXCLUDED.pvp, \
                   dividend_yield = EXCLUDED.dividend_yield, net_profit = EXCLUDED.net_profit, \
                   ebit_ev = EXCLUDED.ebit_ev, roic = EXCLUDED.roic, updated_at = now()",
        )
        .persistent(false)
        .bind(&s.ticker)
        .bind(s.as_of_date)
        .bind(s.pl)
        .bind(s.roe)
        .bind(s.pvp)
        .bind(s.dividend_yield)
        .bind(s.net_profit)
        .bind(s.ebit_ev)
        .bind(s.roic)
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "upsert fundamentals failed (ticker={}, as_of_date={})",
                s.ticker, s.as_of_date
            )
        })?;
        Ok(())
    }

    async fn find_stock(&self, ticker: &str) -> anyhow::Result<Option<StockDescriptor>> {
        let row = sqlx::query_as::<_, StockRow>(
            "SELECT ticker, name, sector, subsector, is_state_owned FROM stocks WHERE ticker = $1",
        )
        .persistent(false)
        .bind(ticker)
        .fetch_optional(&self.pool)
        .await
        .context("select stocks failed")?;
        Ok(row.map(Into::into))
    }

    async fn get_stock(&self, ticker: &str) -> anyhow::Result<Option<StockDetail>> {
        let Some(stock) = self.find_stock(ticker).await? else {
            return Ok(None);
        };

        let history = sqlx::query_as::<_, FundamentalRow>(
            "SELECT ticker, as_of_date, pl, roe, pvp, dividend_yield, net_profit, ebit_ev, roic \
             FROM fundamentals \
             WHERE ticker = $1 \
             ORDER BY as_of_date ASC",
        )
        .persistent(false)
        .bind(&stock.ticker)
        .fetch_all(&self.pool)
        .await
        .context("select fundamentals history failed")?;

        Ok(Some(StockDetail {
            stock,
            history: history.into_iter().map(Into::into).collect(),
        }))
    }

    async fn get_stocks(&self, filter: &FilterSpec) -> anyhow::Result<Vec<StockWithLatest>> {
        let pattern = filter
            .search_term()
            .map(|t| format!("%{}%", escape_like(t)));

        let rows = sqlx::query_as::<_, LatestRow>(
            "SELECT s.ticker, s.name, s.sector, s.subsector, s.is_state_owned, \
                    f.as_of_date, f.pl, f.roe, f.pvp, f.dividend_yield, f.net_profit, f.ebit_ev, f.roic \
             FROM stocks s \
             JOIN ( \
               SELECT DISTINCT ON (ticker) * \
               FROM fundamentals \
               ORDER BY ticker, as_of_date DESC, id DESC \
             ) f ON f.ticker = s.ticker \
             WHERE ($1::text IS NULL OR s.ticker ILIKE $1 OR s.name ILIKE $1) \
               AND (NOT $2 OR NOT s.is_state_owned) \
             ORDER BY s.ticker ASC",
        )
        .persistent(false)
        .bind(pattern)
        .bind(filter.exclude_state_owned)
        .fetch_all(&self.pool)
        .await
        .context("select latest fundamentals failed")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn record_scrape_run(&self, run: &ScrapeRun) -> anyhow::Result<()> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO scrape_runs \
               (id, as_of_date, generated_at, source, status, error, \
                total_scraped, stocks_created, stocks_updated, fundamentals_written) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .persistent(false)
        .bind(id)
        .bind(run.as_of_date)
        .bind(run.generated_at)
        .bind(&run.source)
        .bind(run.status)
        .bind(&run.error)
        .bind(run.total_scraped as i64)
        .bind(run.stocks_created as i64)
        .bind(run.stocks_updated as i64)
        .bind(run.fundamentals_written as i64)
        .execute(&self.pool)
        .await
        .context("insert scrape_runs failed")?;

        tracing::debug!(%id, status = run.status, "recorded scrape run");
        Ok(())
    }
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

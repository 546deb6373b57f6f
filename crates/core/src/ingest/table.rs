use crate::domain::stock::{normalize_ticker, ScrapedRecord, UNKNOWN_SECTOR};
use crate::error::ServiceError;
use crate::ingest::normalize::parse_br_number;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

// Column positions on the results table, layout as of 2024. The header labels repeat and carry
// markup, so cells are read by position. A reordered source page means editing this block only.
pub mod columns {
    pub const TICKER: usize = 0;
    pub const PL: usize = 2;
    pub const PVP: usize = 3;
    pub const DIVIDEND_YIELD: usize = 5;
    pub const EV_EBIT: usize = 10;
    // Net margin ("Mrg. Líq."). Stored as net_profit for lack of an absolute profit column.
    pub const NET_PROFIT_PROXY: usize = 13;
    pub const ROIC: usize = 15;
    pub const ROE: usize = 16;
    pub const LIQUIDITY: usize = 17;

    /// Rows with fewer cells than this cannot be read.
    pub const MIN_CELLS: usize = LIQUIDITY + 1;
    /// Cell count of the layout the positions above were taken from.
    pub const EXPECTED_CELLS: usize = 21;
}

static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tbody tr").expect("valid row selector"));
static TABLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table#resultado").expect("valid table selector"));
static HEADER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("thead th").expect("valid header selector"));
static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td").expect("valid cell selector"));
static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a").expect("valid anchor selector"));

#[derive(Debug, thiserror::Error)]
enum RowError {
    #[error("row has {0} cells, need at least {min}", min = columns::MIN_CELLS)]
    TooFewCells(usize),

    #[error("unusable ticker {ticker:?}: {source}")]
    BadTicker {
        ticker: String,
        source: ServiceError,
    },
}

/// Parses raw page markup and extracts one record per data row.
pub fn extract_records_from_html(html: &str) -> Vec<ScrapedRecord> {
    let document = Html::parse_document(html);
    extract_records(&document)
}

/// Extracts one record per data row of the results table.
///
/// Rows without a ticker are skipped. A row that cannot be read is logged and skipped without
/// affecting the others. A missing table yields an empty list.
pub fn extract_records(document: &Html) -> Vec<ScrapedRecord> {
    let Some(table) = document.select(&TABLE_SELECTOR).next() else {
        tracing::warn!("results table not found in source page");
        return Vec::new();
    };

    let header_cells = table.select(&HEADER_SELECTOR).count();
    if header_cells != 0 && header_cells != columns::EXPECTED_CELLS {
        tracing::warn!(
            header_cells,
            expected = columns::EXPECTED_CELLS,
            "results table header width changed; column positions may be misaligned"
        );
    }

    let mut out = Vec::new();
    let mut skipped: usize = 0;
    for (idx, row) in table.select(&ROW_SELECTOR).enumerate() {
        match extract_row(row) {
            Ok(Some(record)) => out.push(record),
            Ok(None) => skipped += 1,
            Err(err) => {
                skipped += 1;
                tracing::warn!(row = idx, error = %err, "failed to extract row; skipping");
            }
        }
    }

    tracing::debug!(records = out.len(), skipped, "results table extracted");
    out
}

fn extract_row(row: ElementRef<'_>) -> Result<Option<ScrapedRecord>, RowError> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL_SELECTOR).collect();

    let raw_ticker = cells
        .get(columns::TICKER)
        .map(|c| cell_text(*c))
        .unwrap_or_default();
    if raw_ticker.is_empty() {
        return Ok(None);
    }
    let ticker = normalize_ticker(&raw_ticker).map_err(|source| RowError::BadTicker {
        ticker: raw_ticker.clone(),
        source,
    })?;

    if cells.len() < columns::MIN_CELLS {
        return Err(RowError::TooFewCells(cells.len()));
    }

    let name = cells[columns::TICKER]
        .select(&ANCHOR_SELECTOR)
        .next()
        .and_then(|a| a.value().attr("title"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| ticker.clone());

    let num = |idx: usize| parse_br_number(&cell_text(cells[idx]));

    Ok(Some(ScrapedRecord {
        name,
        sector: UNKNOWN_SECTOR.to_string(),
        pl: num(columns::PL),
        pvp: num(columns::PVP),
        dividend_yield: num(columns::DIVIDEND_YIELD),
        ev_ebit: num(columns::EV_EBIT),
        net_profit: num(columns::NET_PROFIT_PROXY),
        roic: num(columns::ROIC),
        roe: num(columns::ROE),
        liquidity: num(columns::LIQUIDITY),
        ticker,
    }))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

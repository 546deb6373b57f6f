//! Filtering and Magic Formula ranking over the latest snapshot of each stock.

use crate::domain::screen::{FilterSpec, MagicFormulaRank, RankedStock, SortMode};
use crate::domain::stock::StockWithLatest;
use crate::storage::matches_search;
use std::cmp::Ordering;

/// Applies every active filter of `spec`, then orders the survivors by `spec.sort`.
pub fn filter_and_rank(rows: Vec<StockWithLatest>, spec: &FilterSpec) -> Vec<RankedStock> {
    let kept: Vec<StockWithLatest> = rows.into_iter().filter(|r| passes(r, spec)).collect();

    match spec.sort {
        SortMode::Ticker => sort_by_ticker(kept),
        SortMode::MagicFormula => rank_magic_formula(kept),
    }
}

/// True when the row satisfies every active filter. A missing metric never satisfies a bound.
pub fn passes(row: &StockWithLatest, spec: &FilterSpec) -> bool {
    if let Some(term) = spec.search_term() {
        if !matches_search(&row.stock, term) {
            return false;
        }
    }

    if spec.exclude_state_owned && row.stock.is_state_owned {
        return false;
    }

    let s = &row.latest;
    at_most(s.pl, spec.max_pl)
        && at_least(s.roe, spec.min_roe)
        && at_most(s.pvp, spec.max_pvp)
        && at_least(s.dividend_yield, spec.min_dividend_yield)
}

fn at_most(value: Option<f64>, bound: Option<f64>) -> bool {
    match bound {
        None => true,
        Some(max) => value.is_some_and(|v| v <= max),
    }
}

fn at_least(value: Option<f64>, bound: Option<f64>) -> bool {
    match bound {
        None => true,
        Some(min) => value.is_some_and(|v| v >= min),
    }
}

fn sort_by_ticker(mut rows: Vec<StockWithLatest>) -> Vec<RankedStock> {
    rows.sort_by(|a, b| a.stock.ticker.cmp(&b.stock.ticker));
    rows.into_iter()
        .map(|r| RankedStock {
            stock: r.stock,
            latest: r.latest,
            magic_formula: None,
        })
        .collect()
}

/// Greenblatt's sum of ranks: rank by ROIC and by earnings yield, both descending, and order by the
/// sum. Missing metrics count as zero. Equal sums keep their input order.
pub fn rank_magic_formula(rows: Vec<StockWithLatest>) -> Vec<RankedStock> {
    let roic_ranks = descending_ranks(&rows, |r| r.latest.roic.unwrap_or(0.0));
    let ey_ranks = descending_ranks(&rows, |r| r.latest.ebit_ev.unwrap_or(0.0));

    let mut ranked: Vec<RankedStock> = rows
        .into_iter()
        .zip(roic_ranks.into_iter().zip(ey_ranks))
        .map(|(r, (roic_rank, earnings_yield_rank))| RankedStock {
            stock: r.stock,
            latest: r.latest,
            magic_formula: Some(MagicFormulaRank {
                roic_rank,
                earnings_yield_rank,
                score: roic_rank + earnings_yield_rank,
            }),
        })
        .collect();

    // Vec::sort_by_key is stable.
    ranked.sort_by_key(|r| r.magic_formula.map_or(u32::MAX, |m| m.score));
    ranked
}

/// 1-based position of each row when stably sorted by `key`, highest first.
fn descending_ranks<F>(rows: &[StockWithLatest], key: F) -> Vec<u32>
where
    F: Fn(&StockWithLatest) -> f64,
{
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| {
        key(&rows[b])
            .partial_cmp(&key(&rows[a]))
            .unwrap_or(Ordering::Equal)
    });

    let mut ranks = vec![0u32; rows.len()];
    for (pos, idx) in order.into_iter().enumerate() {
        ranks[idx] = pos as u32 + 1;
    }
    ranks
}

use crate::domain::stock::{FundamentalSnapshot, StockDescriptor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    Ticker,
    MagicFormula,
}

/// Query-time filter and sort options. Every bound is optional; an absent bound is not applied.
///
/// Also accepts HTML form encoding: blank fields count as absent and checkboxes send `on`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Case-insensitive substring of the ticker or the company name.
    #[serde(deserialize_with = "form::blank_as_none")]
    pub search: Option<String>,
    #[serde(deserialize_with = "form::optional_number")]
    pub max_pl: Option<f64>,
    #[serde(deserialize_with = "form::optional_number")]
    pub min_roe: Option<f64>,
    #[serde(deserialize_with = "form::optional_number")]
    pub max_pvp: Option<f64>,
    #[serde(deserialize_with = "form::optional_number")]
    pub min_dividend_yield: Option<f64>,
    #[serde(deserialize_with = "form::flag")]
    pub exclude_state_owned: bool,
    #[serde(deserialize_with = "form::sort_mode")]
    pub sort: SortMode,
}

mod form {
    use super::SortMode;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrText {
        Bool(bool),
        Text(String),
    }

    pub fn blank_as_none<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let v = Option::<String>::deserialize(d)?;
        Ok(v.filter(|s| !s.trim().is_empty()))
    }

    pub fn optional_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        match Option::<NumberOrText>::deserialize(d)? {
            None => Ok(None),
            Some(NumberOrText::Number(n)) => Ok(Some(n)),
            Some(NumberOrText::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(NumberOrText::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("invalid number {s:?}"))),
        }
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match Option::<BoolOrText>::deserialize(d)? {
            None => Ok(false),
            Some(BoolOrText::Bool(b)) => Ok(b),
            Some(BoolOrText::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "1" | "yes" => Ok(true),
                "" | "false" | "off" | "0" | "no" => Ok(false),
                _ => Err(D::Error::custom(format!("invalid flag {s:?}"))),
            },
        }
    }

    pub fn sort_mode<'de, D: Deserializer<'de>>(d: D) -> Result<SortMode, D::Error> {
        match Option::<String>::deserialize(d)?.as_deref().map(str::trim) {
            None | Some("") => Ok(SortMode::default()),
            Some("ticker") => Ok(SortMode::Ticker),
            Some("magic_formula") => Ok(SortMode::MagicFormula),
            Some(other) => Err(D::Error::custom(format!("unknown sort mode {other:?}"))),
        }
    }
}

impl FilterSpec {
    /// The trimmed search term, if any is left after trimming.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MagicFormulaRank {
    pub roic_rank: u32,
    pub earnings_yield_rank: u32,
    /// Sum of both ranks. Lower is better.
    pub score: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedStock {
    #[serde(flatten)]
    pub stock: StockDescriptor,
    pub latest: FundamentalSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magic_formula: Option<MagicFormulaRank>,
}

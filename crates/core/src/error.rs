use std::borrow::Cow;

/// Failures that callers branch on. Everything else travels as a plain `anyhow::Error`.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("stock {0} not found")]
    NotFound(String),

    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: Cow<'static, str>,
    },

    #[error("scrape extracted zero rows; source layout likely changed")]
    EmptyScrape,

    #[error("scrape wrote nothing: all {attempted} upserts failed, last error: {cause}")]
    NothingWritten { attempted: u64, cause: String },

    #[error("source fetch failed: {0}")]
    Fetch(String),
}

impl ServiceError {
    pub fn invalid(field: &'static str, reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

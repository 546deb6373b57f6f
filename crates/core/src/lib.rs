pub mod domain;
pub mod error;
pub mod ingest;
pub mod rank;
pub mod service;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub source_url: Option<String>,
        pub source_timeout_secs: Option<u64>,
        pub source_user_agent: Option<String>,
        pub port: Option<u16>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let source_timeout_secs = match std::env::var("SOURCE_TIMEOUT_SECS") {
                Ok(s) => Some(
                    s.trim()
                        .parse::<u64>()
                        .with_context(|| format!("SOURCE_TIMEOUT_SECS must be an integer (got {s:?})"))?,
                ),
                Err(_) => None,
            };

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                source_url: std::env::var("SOURCE_URL").ok(),
                source_timeout_secs,
                source_user_agent: std::env::var("SOURCE_USER_AGENT").ok(),
                port: std::env::var("PORT").ok().and_then(|v| v.parse().ok()),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }
    }
}

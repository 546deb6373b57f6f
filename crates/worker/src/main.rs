use anyhow::Context;
use b3scan_core::domain::screen::{FilterSpec, SortMode};
use b3scan_core::ingest::pipeline::{self, ScrapeSummary};
use b3scan_core::ingest::source::{HttpSourceClient, SourceClient};
use b3scan_core::storage::memory::MemoryStore;
use b3scan_core::storage::postgres::PgStore;
use b3scan_core::storage::SnapshotStore;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod seed;

const DRY_RUN_TOP: usize = 20;

#[derive(Debug, Parser)]
#[command(name = "b3scan_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scrape the results page and upsert every row.
    Scrape {
        /// Snapshot date (YYYY-MM-DD). Defaults to today's Brasília date.
        #[arg(long)]
        as_of_date: Option<String>,

        /// Run against an in-memory store and log the Magic Formula ranking instead of writing.
        #[arg(long)]
        dry_run: bool,

        /// Read page markup from this file instead of fetching it.
        #[arg(long)]
        html_file: Option<PathBuf>,
    },

    /// Upsert stock descriptors from a JSON array.
    Seed {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = b3scan_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let res = match args.command {
        Command::Scrape {
            as_of_date,
            dry_run,
            html_file,
        } => scrape(&settings, as_of_date.as_deref(), dry_run, html_file).await,
        Command::Seed { path } => {
            let store = connect(&settings).await?;
            seed::seed_from_file(&store, &path).await.map(|n| {
                tracing::info!(path = %path.display(), stocks = n, "seed finished");
            })
        }
    };

    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
    }
    res
}

async fn scrape(
    settings: &b3scan_core::config::Settings,
    as_of_date: Option<&str>,
    dry_run: bool,
    html_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let as_of_date =
        b3scan_core::time::br_market::resolve_as_of_date(as_of_date, chrono::Utc::now())?;

    let html = match &html_file {
        Some(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("read {} failed", path.display()))?;
            Some(b3scan_core::ingest::source::decode_body(&bytes))
        }
        None => None,
    };

    if dry_run {
        let store = MemoryStore::new();
        let summary = run(&store, settings, html.as_deref(), as_of_date).await?;
        tracing::info!(%as_of_date, dry_run = true, ?summary, "scrape finished (dry-run)");

        let filter = FilterSpec {
            sort: SortMode::MagicFormula,
            ..Default::default()
        };
        let ranked = b3scan_core::service::list_stocks(&store, &filter).await?;
        for (pos, r) in ranked.iter().take(DRY_RUN_TOP).enumerate() {
            tracing::info!(
                position = pos + 1,
                ticker = %r.stock.ticker,
                name = %r.stock.name,
                score = r.magic_formula.map(|m| m.score),
                roic = r.latest.roic,
                ebit_ev = r.latest.ebit_ev,
                "magic formula"
            );
        }
        return Ok(());
    }

    let store = connect(settings).await?;
    let summary = run(&store, settings, html.as_deref(), as_of_date).await?;
    tracing::info!(%as_of_date, ?summary, "scrape persisted");
    Ok(())
}

async fn run(
    store: &dyn SnapshotStore,
    settings: &b3scan_core::config::Settings,
    html: Option<&str>,
    as_of_date: chrono::NaiveDate,
) -> anyhow::Result<ScrapeSummary> {
    match html {
        Some(html) => pipeline::scrape_html(store, html, as_of_date, "file").await,
        None => {
            let source = HttpSourceClient::from_settings(settings)?;
            tracing::info!(url = %source.url(), source = source.source_name(), "fetching source page");
            pipeline::run_scrape(store, &source, as_of_date).await
        }
    }
}

async fn connect(settings: &b3scan_core::config::Settings) -> anyhow::Result<PgStore> {
    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    b3scan_core::storage::migrate(&pool).await?;
    Ok(PgStore::new(pool))
}

fn init_sentry(settings: &b3scan_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_scrape_flags() {
        let args = Args::try_parse_from([
            "b3scan_worker",
            "scrape",
            "--as-of-date",
            "2026-03-02",
            "--dry-run",
        ])
        .unwrap();
        match args.command {
            Command::Scrape {
                as_of_date,
                dry_run,
                html_file,
            } => {
                assert_eq!(as_of_date.as_deref(), Some("2026-03-02"));
                assert!(dry_run);
                assert!(html_file.is_none());
            }
            Command::Seed { .. } => panic!("expected scrape"),
        }
    }
}

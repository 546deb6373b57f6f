use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use b3scan_core::domain::screen::{FilterSpec, RankedStock};
use b3scan_core::domain::stock::{
    FundamentalSnapshot, NewFundamental, NewStock, StockDescriptor, StockDetail, UpsertOutcome,
};
use b3scan_core::error::ServiceError;
use b3scan_core::ingest::pipeline::ScrapeSummary;
use b3scan_core::ingest::source::{HttpSourceClient, SourceClient};
use b3scan_core::storage::postgres::PgStore;
use b3scan_core::storage::SnapshotStore;

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

    let store: Option<Arc<dyn SnapshotStore>> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match b3scan_core::storage::migrate(&pool).await {
                Ok(()) => Some(Arc::new(PgStore::new(pool)) as Arc<dyn SnapshotStore>),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let source: Arc<dyn SourceClient> = Arc::new(HttpSourceClient::from_settings(&settings)?);
    let state = AppState { store, source };

    let port = settings.port.unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/stocks", get(list_stocks).post(create_stock))
        .route("/stocks/:ticker", get(get_stock))
        .route("/fundamentals", post(create_fundamental))
        .route("/scrape", post(trigger_scrape))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    store: Option<Arc<dyn SnapshotStore>>,
    source: Arc<dyn SourceClient>,
}

impl AppState {
    fn store(&self) -> Result<&dyn SnapshotStore, ApiError> {
        self.store
            .as_deref()
            .ok_or(ApiError::Unavailable)
    }
}

enum ApiError {
    Unavailable,
    Failed(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Failed(e)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn status_for(err: &anyhow::Error) -> StatusCode {
    match err.downcast_ref::<ServiceError>() {
        Some(ServiceError::NotFound(_)) => StatusCode::NOT_FOUND,
        Some(ServiceError::Invalid { .. }) => StatusCode::BAD_REQUEST,
        Some(ServiceError::Fetch(_)) => StatusCode::BAD_GATEWAY,
        Some(ServiceError::EmptyScrape | ServiceError::NothingWritten { .. }) | None => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody {
                    error: "database unavailable".to_string(),
                }),
            )
                .into_response(),
            ApiError::Failed(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    sentry_anyhow::capture_anyhow(&err);
                    tracing::error!(error = %err, %status, "request failed");
                }
                (
                    status,
                    Json(ErrorBody {
                        error: format!("{err:#}"),
                    }),
                )
                    .into_response()
            }
        }
    }
}

async fn list_stocks(
    State(state): State<AppState>,
    Query(filter): Query<FilterSpec>,
) -> Result<Json<Vec<RankedStock>>, ApiError> {
    let store = state.store()?;
    let out = b3scan_core::service::list_stocks(store, &filter).await?;
    Ok(Json(out))
}

async fn get_stock(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<StockDetail>, ApiError> {
    let store = state.store()?;
    let detail = b3scan_core::service::stock_detail(store, &ticker).await?;
    Ok(Json(detail))
}

async fn create_stock(
    State(state): State<AppState>,
    Json(input): Json<NewStock>,
) -> Result<(StatusCode, Json<StockDescriptor>), ApiError> {
    let store = state.store()?;
    let (stock, outcome) = b3scan_core::service::create_stock(store, input).await?;
    let status = match outcome {
        UpsertOutcome::Created => StatusCode::CREATED,
        UpsertOutcome::Updated => StatusCode::OK,
    };
    Ok((status, Json(stock)))
}

async fn create_fundamental(
    State(state): State<AppState>,
    Json(input): Json<NewFundamental>,
) -> Result<(StatusCode, Json<FundamentalSnapshot>), ApiError> {
    let store = state.store()?;
    let snapshot = b3scan_core::service::create_fundamental(store, input).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn trigger_scrape(State(state): State<AppState>) -> Result<Json<ScrapeSummary>, ApiError> {
    let store = state.store()?;
    let as_of_date = b3scan_core::time::br_market::resolve_as_of_date(None, chrono::Utc::now())?;
    let summary =
        b3scan_core::ingest::pipeline::run_scrape(store, state.source.as_ref(), as_of_date).await?;
    Ok(Json(summary))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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

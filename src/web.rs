use crate::{
    app::{App, AppError, DailyRentalsReport, RevenueReport, TopMoviesReport},
    analytics::{CustomerInfo, CustomerMovie, RentalRecord},
    corpus::CorpusOverview,
    semantic::{EngineStatus, SimilarityResult},
    source::Table,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

/// Rows included in the `/api/movies` preview
const MOVIES_PREVIEW: usize = 10;

#[derive(Clone)]
struct SharedState {
    app: Arc<App>,
}

pub fn router(app: Arc<App>) -> Router {
    let static_dir = app.config().server.static_dir.clone();
    let shared_state = Arc::new(SharedState { app });

    let router = Router::new()
        .route("/api/health", get(health))
        .route("/api/rentals/daily", get(daily_rentals))
        .route("/api/revenue", get(revenue))
        .route("/api/movies", get(movies))
        .route("/api/movies/top", get(top_movies))
        .route("/api/recommend", post(recommend))
        .route("/api/engine", get(engine_status))
        .route("/api/engine/reload", post(reload))
        .route("/api/customers/:id", get(customer))
        .route("/api/customers/:id/rentals", get(customer_rentals))
        .route("/api/customers/:id/top_movies", get(customer_top_movies));

    let router = match static_dir {
        Some(dir) => router.fallback_service(tower_http::services::ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn start_app(app: App) -> anyhow::Result<()> {
    let app = Arc::new(app);
    let bind = app.config().server.bind.clone();

    if app.config().semantic.warm_on_start {
        let warm = app.clone();
        tokio::task::spawn_blocking(move || match warm.warm_up() {
            Ok(status) => log::info!("engine warmed up: {} movies", status.corpus_size),
            Err(err) => log::error!("engine warm-up failed: {err}"),
        });
    }

    async fn shutdown_signal() {
        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                log::error!("failed to install Ctrl+C handler: {err}");
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(err) => log::error!("failed to install signal handler: {err}"),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
        log::warn!("shutting down");
    }

    let router = router(app);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    log::info!("listening on {bind}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(app: App) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { start_app(app).await })
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match self.0 {
            AppError::CustomerNotFound(_) => StatusCode::NOT_FOUND,
            AppError::EmptyQuery(_) | AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::ModelMismatch(_) => {
                log::error!("{self:?}");
                StatusCode::CONFLICT
            }
            AppError::DataSource(_) => {
                log::error!("{self:?}");
                StatusCode::BAD_GATEWAY
            }
            AppError::Engine(_) | AppError::Other(_) => {
                log::error!("{self:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn health(State(state): State<Arc<SharedState>>) -> Result<Json<Table>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || Ok(app.connection_check()?.into()))
}

#[derive(Debug, Default, Deserialize)]
struct YearQuery {
    year: Option<i32>,
}

async fn daily_rentals(
    State(state): State<Arc<SharedState>>,
    Query(query): Query<YearQuery>,
) -> Result<Json<DailyRentalsReport>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || Ok(app.daily_rentals(query.year)?.into()))
}

async fn revenue(State(state): State<Arc<SharedState>>) -> Result<Json<RevenueReport>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || Ok(app.revenue()?.into()))
}

async fn movies(
    State(state): State<Arc<SharedState>>,
) -> Result<Json<CorpusOverview>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || Ok(app.movies(MOVIES_PREVIEW)?.into()))
}

#[derive(Debug, Default, Deserialize)]
struct TopMoviesQuery {
    year: Option<i32>,
    limit: Option<usize>,
}

async fn top_movies(
    State(state): State<Arc<SharedState>>,
    Query(query): Query<TopMoviesQuery>,
) -> Result<Json<TopMoviesReport>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || Ok(app.top_movies(query.year, query.limit)?.into()))
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub description: String,
    pub top_n: Option<i64>,
}

async fn recommend(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<RecommendRequest>,
) -> Result<Json<Vec<SimilarityResult>>, HttpError> {
    log::debug!("payload: {payload:?}");

    let app = state.app.clone();
    tokio::task::block_in_place(move || {
        Ok(app.recommend(&payload.description, payload.top_n)?.into())
    })
}

async fn engine_status(State(state): State<Arc<SharedState>>) -> Json<EngineStatus> {
    state.app.engine_status().into()
}

#[derive(Debug, Default, Deserialize)]
pub struct ReloadRequest {
    /// Recreate the embedding model as well as the corpus
    #[serde(default)]
    pub reload_model: bool,
}

async fn reload(
    State(state): State<Arc<SharedState>>,
    payload: Option<Json<ReloadRequest>>,
) -> Result<Json<EngineStatus>, HttpError> {
    let reload_model = payload.map(|Json(p)| p.reload_model).unwrap_or(false);

    let app = state.app.clone();
    tokio::task::block_in_place(move || Ok(app.reload(reload_model)?.into()))
}

async fn customer(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<i64>,
) -> Result<Json<CustomerInfo>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || Ok(app.customer(id)?.into()))
}

async fn customer_rentals(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<RentalRecord>>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || Ok(app.rental_history(id)?.into()))
}

#[derive(Debug, Default, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn customer_top_movies(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<CustomerMovie>>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || Ok(app.customer_top_movies(id, query.limit)?.into()))
}

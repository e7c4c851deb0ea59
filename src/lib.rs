//! Driftboard - live dashboards over an external post-search service
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                       │
//! │  - Dashboard management endpoints                           │
//! │  - SSE event feed                                           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Background Sync Layer                      │
//! │  - Serialized job executor                                  │
//! │  - Reconciliation engine (rules / recent / live stream)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Data Layer                            │
//! │  - SQLite (sqlx), explicit transactions                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers for dashboards, events and metrics
//! - `service`: Business logic layer
//! - `sync`: Job executor, scheduler, stream consumer, engine
//! - `search`: Upstream search API client and wire types
//! - `data`: Database layer
//! - `notify`: In-process event hub
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod search;
pub mod service;
pub mod sync;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains shared
/// resources like the database pool, the search client and the
/// background machinery.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Search API client
    pub search: Arc<search::SearchClient>,

    /// Reconciliation engine
    pub engine: Arc<sync::Engine<search::SearchClient>>,

    /// Serialized job executor
    pub executor: Arc<sync::JobExecutor>,

    /// Dashboard service
    pub dashboards: Arc<service::DashboardService<search::SearchClient>>,

    /// Notification hub feeding the SSE endpoint
    pub hub: notify::Hub,

    /// Cancellation token shared by all background tasks
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database and run migrations
    /// 2. Build the search API client
    /// 3. Start the job executor
    /// 4. Wire up the engine and services
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!("Database connected");

        let search = Arc::new(search::SearchClient::new(&config.search)?);
        let hub = notify::Hub::default();
        let shutdown = CancellationToken::new();

        let executor = Arc::new(sync::JobExecutor::start(
            config.sync.job_queue_capacity,
            shutdown.clone(),
        ));

        let engine = Arc::new(sync::Engine::new(
            Arc::clone(&db),
            Arc::clone(&search),
            hub.clone(),
            config.sync.clone(),
        ));

        let dashboards = Arc::new(service::DashboardService::new(
            Arc::clone(&db),
            Arc::clone(&search),
            Arc::clone(&engine),
            Arc::clone(&executor),
            hub.clone(),
        ));

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            search,
            engine,
            executor,
            dashboards,
            hub,
            shutdown,
        })
    }

    /// Start the background synchronization machinery
    ///
    /// Imports rules, opens the live stream, queues the initial
    /// backfill and starts the periodic scheduler.
    pub async fn start_sync(&self) -> Result<(), error::AppError> {
        sync::start(
            Arc::clone(&self.search),
            Arc::clone(&self.engine),
            Arc::clone(&self.executor),
            &self.config.sync,
            self.shutdown.clone(),
        )
        .await
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::dashboards_router())
        .merge(api::events_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}

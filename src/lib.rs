//! lectern library interface
//!
//! Exposes the application state, router assembly, and service modules
//! for integration testing.

pub mod analyzers;
pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::EvalConfig;
use crate::services::aggregator::ScoreAggregator;
use crate::services::normalizer::ScoreNormalizer;
use crate::services::orchestrator::EvaluationOrchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EvalConfig>,
    pub orchestrator: Arc<EvaluationOrchestrator>,
    pub normalizer: ScoreNormalizer,
    pub aggregator: ScoreAggregator,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Build state with real analyzer clients from the configuration.
    pub fn new(config: EvalConfig) -> anyhow::Result<Self> {
        let orchestrator = EvaluationOrchestrator::from_config(&config)?;
        Self::with_orchestrator(Arc::new(config), Arc::new(orchestrator))
    }

    /// Build state around an existing orchestrator. Used by tests to
    /// substitute scripted analyzers.
    pub fn with_orchestrator(
        config: Arc<EvalConfig>,
        orchestrator: Arc<EvaluationOrchestrator>,
    ) -> anyhow::Result<Self> {
        let normalizer = ScoreNormalizer::new(config.pacing);
        let aggregator = ScoreAggregator::new(config.weights)?;

        Ok(Self {
            config,
            orchestrator,
            normalizer,
            aggregator,
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    // The body cap sits above the application limit: the analyze
    // handler enforces `upload_max_bytes` itself and shapes the 413
    // JSON body.
    let body_cap = state.config.upload_max_bytes.saturating_add(1024 * 1024);

    Router::new()
        .merge(api::analyze::analyze_routes())
        .merge(api::health::health_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_cap))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

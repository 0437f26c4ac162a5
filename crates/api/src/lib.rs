//! `api` crate — HTTP REST API layer.
//!
//! Exposes:
//!   GET    /api/v1/workflows
//!   POST   /api/v1/workflows                    (validate + compile + save)
//!   GET    /api/v1/workflows/:workflow_id
//!   GET    /api/v1/workflows/:workflow_id/:version
//!   POST   /api/v1/workflows/:workflow_id/execute
//!   GET    /api/v1/runs/:run_id
//!   POST   /api/v1/validate/:stage
//!   GET    /api/v1/schedules/:schedule_id
//!   PUT    /api/v1/schedules/:schedule_id
//!   POST   /api/v1/schedules/:schedule_id/pause
//!   DELETE /api/v1/schedules/:schedule_id
//!   POST   /webhook/:path

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use catalog::{ActionSpec, InMemoryCatalog, ToolCatalog, TriggerSpec};
use db::{DbPool, PgStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub store: Arc<PgStore>,
    pub catalog: Arc<dyn ToolCatalog>,
}

/// The catalog seed used by both the API server and the CLI's `validate`/
/// `compile` commands. A real deployment replaces this with the integration
/// catalog cache `catalog::ToolCatalog`'s own doc comment describes; this
/// stands in with the handful of providers exercised by the built-in mock
/// node and the bundled test workflows.
pub fn bootstrap_catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_provider("slack", "Slack")
        .with_provider("github", "GitHub")
        .with_provider("core", "Core")
        .with_action(
            "slack",
            "send_message",
            ActionSpec { required_params: vec!["channel".into()], optional_params: vec!["thread_ts".into()], ..Default::default() },
        )
        .with_action(
            "github",
            "create_issue",
            ActionSpec { required_params: vec!["repo".into(), "title".into()], ..Default::default() },
        )
        .with_action("core", "transform", ActionSpec::default())
        .with_trigger("github", "issue_opened", TriggerSpec { filter_params: vec!["repo".into()] })
        .with_trigger("core", "manual", TriggerSpec::default())
}

pub async fn serve(bind: &str, pool: DbPool) -> Result<(), std::io::Error> {
    let store = Arc::new(PgStore::new(pool.clone()));
    let catalog: Arc<dyn ToolCatalog> = Arc::new(bootstrap_catalog());
    let state = AppState { pool, store, catalog };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let api_router = Router::new()
        .route("/workflows", get(handlers::workflows::list).post(handlers::workflows::create))
        .route("/workflows/:workflow_id", get(handlers::workflows::get_latest))
        .route("/workflows/:workflow_id/:version", get(handlers::workflows::get_version))
        .route("/workflows/:workflow_id/execute", post(handlers::executions::execute))
        .route("/runs/:run_id", get(handlers::runs::get))
        .route("/validate/:stage", post(handlers::validate::validate))
        .route(
            "/schedules/:schedule_id",
            get(handlers::schedules::get).put(handlers::schedules::upsert).delete(handlers::schedules::delete),
        )
        .route("/schedules/:schedule_id/pause", post(handlers::schedules::pause));

    let app = Router::new()
        .nest("/api/v1", api_router)
        .route("/webhook/:path", post(handlers::webhooks::handle_webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await
}

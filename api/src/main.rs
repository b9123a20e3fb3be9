use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::http::Uri;
use rollout_core::policy::FailurePolicy;
use rollout_core::task::InMemoryTaskRegistry;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod error;
mod middleware;
mod routes;
mod state;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rollout Analysis Agent API",
        version = "0.1.0",
        description = "Canary analysis for progressive delivery controllers. Speaks A2A JSON-RPC and a synchronous REST call."
    ),
    paths(routes::health::health_check, routes::analyze::analyze),
    components(schemas(
        HealthResponse,
        rollout_core::message::AnalysisRequest,
        rollout_core::decision::DecisionRecord,
        rollout_core::decision::Confidence,
        rollout_core::error::ApiError,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[schema(value_type = String, example = "fail_open")]
    pub failure_policy: FailurePolicy,
}

async fn not_found(uri: Uri) -> error::AppError {
    tracing::debug!(path = %uri.path(), "No route for request");
    error::AppError::NotFound {
        message: "Endpoint not found".to_string(),
    }
}

fn build_router(app_state: state::AppState) -> Router {
    let cors_layer = middleware::cors::build_cors_layer(&app_state.config.cors_origins);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::agent_card::router())
        .merge(routes::analyze::router())
        .merge(routes::a2a::router())
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer)
                .layer(axum::middleware::from_fn(middleware::security_headers::apply)),
        )
        .with_state(app_state)
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rollout_api=debug,rollout_core=debug,rollout_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let service_config = config::ServiceConfig::from_env();

    let engine = match rollout_engine::engine_from_env() {
        Ok(engine) => engine,
        Err(err) => {
            tracing::error!(error = %err, "Failed to configure reasoning engine");
            std::process::exit(1);
        }
    };

    tracing::info!(
        failure_policy = ?service_config.failure_policy,
        explicit_confidence = service_config.explicit_confidence,
        agent_url = %service_config.agent_url(),
        "Service configured"
    );

    let port = service_config.port;
    let registry = InMemoryTaskRegistry::with_capacity(service_config.task_capacity);
    let app_state = state::AppState::new(
        Arc::new(engine),
        Arc::new(registry),
        service_config,
    );
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Rollout agent listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}

use axum::{Router, extract::State, routing::get};
use serde::Serialize;

use crate::{ApiResponse, Ctx, metadata::Provider};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub providers: Vec<Provider>,
}

/// GET /api/health
async fn health(State(ctx): State<Ctx>) -> ApiResponse<HealthResponse> {
    ApiResponse::ok(
        "Service healthy",
        HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            providers: ctx.metadata.providers().collect(),
        },
    )
}

/// Mount health routes
pub fn mount() -> Router<Ctx> {
    Router::new().route("/health", get(health))
}

use axum::Router;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::Ctx;

pub mod api;

/// Build the application router with its middleware stack
pub fn router(ctx: Ctx) -> Router {
    Router::new()
        .nest("/api", api::mount())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::new()),
        )
        .with_state(ctx)
}

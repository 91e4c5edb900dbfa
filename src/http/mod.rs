// src/http/mod.rs
// axum front door

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::proxy::ToolProxy;

pub use error::{ApiError, ApiResult};
pub use routes::{ChatReply, ChatRequest};

/// Create the HTTP router for one proxy instance
pub fn create_router(proxy: Arc<ToolProxy>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(routes::chat))
        .route("/health", get(routes::health))
        .route("/tools", get(routes::tools))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(proxy)
}

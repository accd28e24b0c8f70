use axum::{
    Router,
    routing::{get, put},
    middleware::from_fn_with_state,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::core::app::AppState;
use crate::web::handlers::transactions;
use crate::web::middleware::hs_token_middleware;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Event delivery from the homeserver
        .route(
            "/_matrix/app/v1/transactions/:txn_id",
            put(transactions::push_transaction).layer(from_fn_with_state(state.clone(), hs_token_middleware)),
        )

        // Health check
        .route("/health", get(health_check))

        .layer(TraceLayer::new_for_http())

        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

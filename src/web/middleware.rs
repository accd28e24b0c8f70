use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use crate::core::app::AppState;

#[derive(Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

/// Rejects transactions that do not carry the homeserver's token, either as
/// a bearer header or as the legacy `access_token` query parameter.
pub async fn hs_token_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let header_token = request
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::to_owned);

    let query_token = Query::<TokenQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(query)| query.access_token);

    match header_token.or(query_token) {
        Some(token) if token == state.config.appservice.hs_token => Ok(next.run(request).await),
        Some(_) => {
            warn!("Rejected transaction with wrong hs_token");
            Err(StatusCode::FORBIDDEN)
        }
        None => Err(StatusCode::UNAUTHORIZED),
    }
}

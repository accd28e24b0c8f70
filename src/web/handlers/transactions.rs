use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::app::AppState;
use crate::core::types::MembershipEvent;

#[derive(Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub events: Vec<Value>,
}

/// Feeds every event of a pushed transaction to the reconciler.
///
/// Always answers `{}`: failures inside the reconciler never reach the
/// homeserver, which would otherwise keep retrying the transaction.
pub async fn push_transaction(
    State(state): State<Arc<AppState>>,
    Path(txn_id): Path<String>,
    Json(transaction): Json<Transaction>,
) -> Json<Value> {
    debug!("Transaction {} with {} events", txn_id, transaction.events.len());

    for raw in transaction.events {
        let event: MembershipEvent = match serde_json::from_value(raw) {
            Ok(event) => event,
            Err(e) => {
                debug!("Skipping undecodable event in {}: {}", txn_id, e);
                continue;
            }
        };

        if let Some(summary) = state.reconciler.on_new_event(&event).await {
            info!(
                "Transaction {}: removed {} from {} rooms of {}",
                txn_id,
                summary.user_id,
                summary.left.len(),
                summary.space_id
            );
        }
    }

    Json(json!({}))
}

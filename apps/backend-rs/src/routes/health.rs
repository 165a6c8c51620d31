use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Duration;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    // Bounded so the healthcheck answers even when the store hangs.
    let source_ok = match tokio::time::timeout(Duration::from_secs(3), state.source.ping()).await
    {
        Ok(reachable) => {
            if !reachable {
                tracing::error!(
                    source = state.source.kind().as_str(),
                    "Health check source unreachable"
                );
            }
            reachable
        }
        Err(_) => {
            tracing::error!("Health check source ping timed out (3s)");
            false
        }
    };

    let status = if source_ok { "ok" } else { "degraded" };
    Json(json!({
        "status": status,
        "now": Utc::now().to_rfc3339(),
        "source": state.source.kind().as_str(),
        "source_ok": source_ok
    }))
}

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use growatt2feed::controller::{Controller, CycleError};
use log::{error, info};
use serde_json::{json, Value};

const REQUEST_FAILED: &str = "failed to process request";

/// On-demand trigger: any hit on `/` runs one full cycle.
pub fn router(controller: Arc<Controller>) -> Router {
    Router::new()
        .route("/", get(trigger).post(trigger))
        .route("/health", get(|| async { "ok" }))
        .with_state(controller)
}

async fn trigger(State(controller): State<Arc<Controller>>) -> (StatusCode, Json<Value>) {
    info!("cycle requested over HTTP");

    match controller.run_isolated().await {
        Ok(cycle) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                // -1 no-op, 0 disable, 1 enable
                "action": cycle.decision.code(),
                "decision": cycle.decision,
                "output": cycle.output(),
            })),
        ),
        Err(e) => {
            error!("{REQUEST_FAILED}: {e}");
            let msg = match e {
                CycleError::Config(e) => e.to_string(),
                CycleError::Aborted(_) => REQUEST_FAILED.into(),
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "msg": msg })),
            )
        }
    }
}

//! Liveness probe
//!
//! Unversioned: it sits outside the negotiation layer so load balancers can
//! probe it without speaking the microversion protocol.

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

/// Router for the health endpoint
pub fn routes() -> Router {
    Router::new().route("/healthcheck", get(healthcheck))
}

async fn healthcheck() -> Json<Value> {
    Json(json!({ "status": "pass" }))
}

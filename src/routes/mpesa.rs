use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::handlers::mpesa_handlers;
use crate::state::AppState;

pub fn mpesa_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(mpesa_health))
        // C2B
        .route("/stkpush", post(mpesa_handlers::initiate_stk_push))
        .route("/mpesa-callback", post(mpesa_handlers::mpesa_callback))
        .route(
            "/payment-status/:checkout_request_id",
            get(mpesa_handlers::payment_status),
        )
}

async fn mpesa_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "mpesa",
        "environment": state.config.mpesa_environment.to_string(),
        "store": state.store.backend(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

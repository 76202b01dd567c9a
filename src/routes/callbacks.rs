use axum::{Router, routing::post};
use tower_http::trace::TraceLayer;

use crate::handlers::payment;
use crate::state::AppState;
use std::sync::Arc;

/// Create the gateway callback router (no bearer auth - authenticated
/// by the X-VERIFY checksum on each request)
pub fn create_callback_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payment/callback", post(payment::payment_callback))
        .layer(TraceLayer::new_for_http())
}

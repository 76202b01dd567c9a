use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{credits, payment, speak, talking_image, voices};
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router with protected routes
///
/// Note: Authentication middleware should be applied in main.rs after state is available
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Protected routes (auth required when AUTH_REQUIRED=true)
        .route("/payment/initiate", post(payment::initiate_payment))
        .route("/credits", get(credits::get_credits))
        .route("/speak", post(speak::speak))
        .route("/voices/clone", post(voices::clone_voice))
        .route("/talking-image", post(talking_image::talking_image))
        .layer(TraceLayer::new_for_http())
}

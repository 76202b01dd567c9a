//! Credit balance handler.

use axum::{
    extract::{Extension, State},
    response::Json,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::Auth;
use crate::errors::app_error::AppResult;
use crate::state::AppState;

/// Handler for GET /credits - The caller's balances by product name.
///
/// # Response
///
/// ```json
/// {
///   "credits": {
///     "Text to Speech Pro": 1000,
///     "Voice Cloning Pro": 1000,
///     "Talking Image": 0
///   }
/// }
/// ```
pub async fn get_credits(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
) -> AppResult<Json<Value>> {
    let account_id = auth.account_id()?;
    let balances = state.ledger.balances(account_id)?;

    let credits: HashMap<&'static str, i64> = balances
        .into_iter()
        .map(|(kind, balance)| (kind.product_name(), balance))
        .collect();

    Ok(Json(json!({ "credits": credits })))
}

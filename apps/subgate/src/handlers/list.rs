use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::error::GatewayError;
use crate::{pipeline, AppState};

/// All distinct subscription ids observed across the inbound directory.
pub async fn list_subscriptions(
    State(state): State<AppState>,
) -> Result<Json<Value>, GatewayError> {
    let ids = pipeline::list_subscription_ids(&state.panel_client).await?;

    Ok(Json(json!({
        "success": true,
        "count": ids.len(),
        "subscriptions": ids
    })))
}

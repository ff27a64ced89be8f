use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::aggregate::{AggregatedTraffic, ClientMatch};
use crate::error::GatewayError;
use crate::{pipeline, AppState};

#[derive(Serialize)]
struct TrafficData {
    #[serde(flatten)]
    aggregate: AggregatedTraffic,
    clients: Vec<ClientMatch>,
}

/// Structured traffic view of one subscription.
pub async fn traffic_handler(
    Path(sub_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, GatewayError> {
    let usage = pipeline::collect_usage(&state.panel_client, &sub_id).await?;

    let data = TrafficData {
        aggregate: usage.aggregate,
        clients: usage.clients,
    };

    Ok(Json(json!({
        "success": true,
        "subId": sub_id,
        "data": data
    })))
}

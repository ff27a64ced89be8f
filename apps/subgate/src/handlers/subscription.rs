use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::info;

use crate::aggregate::AggregatedTraffic;
use crate::utils::format_bytes_str;
use crate::{delivery, pipeline, AppState};

#[derive(Template, WebTemplate)]
#[template(path = "subscription.html")]
struct SubscriptionPage {
    sub_id: String,
    sub_url: String,
    data: AggregatedTraffic,
    up_display: String,
    down_display: String,
    used_display: String,
    limit_display: String,
    remaining_display: String,
    payload: String,
    backup_link: String,
}

impl SubscriptionPage {
    fn new(
        sub_id: String,
        sub_url: String,
        data: AggregatedTraffic,
        payload: String,
        backup_link: String,
    ) -> Self {
        Self {
            up_display: format_bytes_str(data.total_up),
            down_display: format_bytes_str(data.total_down),
            used_display: format_bytes_str(data.total_used),
            limit_display: if data.total_limit == 0 {
                "Unlimited".to_string()
            } else {
                format_bytes_str(data.total_limit)
            },
            remaining_display: format_bytes_str(data.remaining),
            sub_id,
            sub_url,
            data,
            payload,
            backup_link,
        }
    }
}

/// Primary subscription route.
///
/// The raw payload fetch and the aggregation pipeline have no data
/// dependency on each other and run concurrently.
pub async fn subscription_handler(
    Path(sub_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    info!(%sub_id, %user_agent, "subscription request");

    let (usage, payload) = match tokio::join!(
        pipeline::collect_usage(&state.panel_client, &sub_id),
        pipeline::fetch_subscription_payload(
            &state.content_client,
            &state.config.subscription_url,
            &sub_id,
        ),
    ) {
        (Ok(usage), Ok(payload)) => (usage, payload),
        (Err(e), _) => return e.into_response(),
        (_, Err(e)) => return e.into_response(),
    };

    if delivery::is_browser_agent(user_agent) {
        let sub_url = format!("{}{}", state.config.subscription_url, sub_id);
        let page = SubscriptionPage::new(
            sub_id,
            sub_url,
            usage.aggregate,
            payload,
            state.config.backup_link.clone(),
        );
        return page.into_response();
    }

    match delivery::compose_payload(&payload, &state.config.backup_link) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

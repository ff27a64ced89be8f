//! Per-request orchestration: login, directory fetch, match, collect, merge.

use futures::future::join_all;
use tracing::{info, warn};

use crate::aggregate::{self, AggregatedTraffic, ClientMatch, TrafficRecord};
use crate::error::GatewayError;
use crate::panel_client::{ClientTraffic, PanelClient};

pub struct SubscriptionUsage {
    pub aggregate: AggregatedTraffic,
    pub clients: Vec<ClientMatch>,
}

/// Run the full aggregation pipeline for one subscription id.
///
/// A per-client traffic failure drops that client from the aggregate; the
/// request only fails when no client yields a record.
pub async fn collect_usage(
    panel: &PanelClient,
    sub_id: &str,
) -> Result<SubscriptionUsage, GatewayError> {
    let session = panel.login().await?;
    let inbounds = panel.list_inbounds(&session).await?;

    let matches = aggregate::match_clients(&inbounds, sub_id);
    if matches.is_empty() {
        return Err(GatewayError::NoSuchSubscription(sub_id.to_string()));
    }
    info!(%sub_id, clients = matches.len(), "collecting traffic");

    let lookups = matches
        .iter()
        .map(|m| panel.client_traffic(&session, &m.email));
    let results = join_all(lookups).await;

    let records = build_records(&matches, results);
    if records.is_empty() {
        return Err(GatewayError::NoTrafficData(sub_id.to_string()));
    }

    Ok(SubscriptionUsage {
        aggregate: aggregate::aggregate(&records),
        clients: matches,
    })
}

/// Pair each match with its lookup result, dropping failed lookups.
fn build_records(
    matches: &[ClientMatch],
    results: Vec<Result<ClientTraffic, GatewayError>>,
) -> Vec<TrafficRecord> {
    let mut records = Vec::with_capacity(matches.len());
    for (m, result) in matches.iter().zip(results) {
        match result {
            Ok(traffic) => records.push(TrafficRecord {
                email: m.email.clone(),
                inbound_id: m.inbound_id,
                inbound_remark: m.inbound_remark.clone(),
                up: traffic.up,
                down: traffic.down,
                total: traffic.total,
                expiry_time: traffic.expiry_time,
                enabled: traffic.enable,
            }),
            Err(e) => {
                warn!(email = %m.email, inbound = m.inbound_id, "dropping client from aggregate: {e}");
            }
        }
    }
    records
}

/// Discover every distinct subscription id known to the panel.
pub async fn list_subscription_ids(panel: &PanelClient) -> Result<Vec<String>, GatewayError> {
    let session = panel.login().await?;
    let inbounds = panel.list_inbounds(&session).await?;
    Ok(aggregate::subscription_ids(&inbounds))
}

/// Fetch the raw base64 subscription payload from the content host.
///
/// Single attempt; only panel calls go through the retrying executor.
pub async fn fetch_subscription_payload(
    client: &reqwest::Client,
    base_url: &str,
    sub_id: &str,
) -> Result<String, GatewayError> {
    let url = format!("{base_url}{sub_id}");
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| GatewayError::Transport(format!("fetching {url}: {e}")))?
        .error_for_status()
        .map_err(|e| GatewayError::Transport(format!("fetching {url}: {e}")))?;

    response
        .text()
        .await
        .map_err(|e| GatewayError::Transport(format!("reading {url}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_match(inbound_id: i64, remark: &str, email: &str) -> ClientMatch {
        ClientMatch {
            email: email.to_string(),
            inbound_id,
            inbound_remark: remark.to_string(),
            client_id: format!("id-{email}"),
        }
    }

    fn traffic(up: i64, down: i64, total: i64) -> ClientTraffic {
        ClientTraffic {
            up,
            down,
            total,
            expiry_time: 0,
            enable: true,
        }
    }

    #[test]
    fn failed_lookup_drops_only_that_client() {
        let matches = vec![
            client_match(1, "Germany", "u1@de"),
            client_match(2, "Finland", "u1@fi"),
        ];
        let results = vec![
            Ok(traffic(100, 200, 1000)),
            Err(GatewayError::Transport("upstream returned status 500".into())),
        ];

        let records = build_records(&matches, results);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].email, "u1@de");

        let agg = aggregate::aggregate(&records);
        assert_eq!(agg.total_used, 300);
        assert_eq!(agg.inbound_count, 1);
    }

    #[test]
    fn all_lookups_failing_leaves_no_records() {
        let matches = vec![client_match(1, "Germany", "u1@de")];
        let results = vec![Err(GatewayError::Transport("timed out".into()))];
        assert!(build_records(&matches, results).is_empty());
    }
}

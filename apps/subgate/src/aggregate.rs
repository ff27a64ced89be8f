//! Matching and merging of per-client traffic across inbounds.

use serde::Serialize;
use std::collections::HashSet;

use crate::panel_client::Inbound;

/// A client that matched the requested subscription id, with the inbound
/// it came from.
#[derive(Debug, Clone, Serialize)]
pub struct ClientMatch {
    pub email: String,
    #[serde(rename = "inboundId")]
    pub inbound_id: i64,
    #[serde(rename = "inboundRemark")]
    pub inbound_remark: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
}

/// Traffic counters for one collected client.
#[derive(Debug, Clone)]
pub struct TrafficRecord {
    pub email: String,
    pub inbound_id: i64,
    pub inbound_remark: String,
    pub up: i64,
    pub down: i64,
    pub total: i64,
    pub expiry_time: i64,
    pub enabled: bool,
}

/// The merged usage view across all clients of one subscription.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedTraffic {
    #[serde(rename = "totalUp")]
    pub total_up: i64,
    #[serde(rename = "totalDown")]
    pub total_down: i64,
    #[serde(rename = "totalUsed")]
    pub total_used: i64,
    #[serde(rename = "totalLimit")]
    pub total_limit: i64,
    /// May be negative when the subscription is over quota.
    pub remaining: i64,
    #[serde(rename = "usagePercent")]
    pub usage_percent: String,
    #[serde(rename = "expiryTime")]
    pub expiry_time: i64,
    pub enabled: bool,
    #[serde(rename = "inboundCount")]
    pub inbound_count: usize,
    #[serde(rename = "inboundRemarks")]
    pub inbound_remarks: Vec<String>,
}

/// All clients whose subscription id equals `sub_id`, across all inbounds.
///
/// Duplicate `(inbound_id, client_id)` pairs in the directory collapse to
/// one match.
pub fn match_clients(inbounds: &[Inbound], sub_id: &str) -> Vec<ClientMatch> {
    let mut seen = HashSet::new();
    let mut matches = Vec::new();

    for inbound in inbounds {
        for client in &inbound.clients {
            if client.sub_id != sub_id {
                continue;
            }
            if !seen.insert((inbound.id, client.id.clone())) {
                continue;
            }
            matches.push(ClientMatch {
                email: client.email.clone(),
                inbound_id: inbound.id,
                inbound_remark: inbound.remark.clone(),
                client_id: client.id.clone(),
            });
        }
    }
    matches
}

/// Distinct subscription ids across the directory, in first-observed order.
pub fn subscription_ids(inbounds: &[Inbound]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for inbound in inbounds {
        for client in &inbound.clients {
            if client.sub_id.is_empty() {
                continue;
            }
            if seen.insert(client.sub_id.clone()) {
                ids.push(client.sub_id.clone());
            }
        }
    }
    ids
}

/// Merge a non-empty record sequence into one aggregate.
///
/// The quota, expiry time and enabled flag come from the first record: the
/// panel applies one quota per subscription, so divergent per-client values
/// are not reconciled (first wins). `remaining` is not clamped at zero.
/// A quota of 0 means unlimited, reported as 0.00 percent used.
pub fn aggregate(records: &[TrafficRecord]) -> AggregatedTraffic {
    debug_assert!(!records.is_empty());

    let total_up: i64 = records.iter().map(|r| r.up).sum();
    let total_down: i64 = records.iter().map(|r| r.down).sum();
    let total_used = total_up + total_down;

    let first = &records[0];
    let total_limit = first.total;
    let remaining = total_limit - total_used;
    let usage_percent = if total_limit > 0 {
        format!("{:.2}", total_used as f64 * 100.0 / total_limit as f64)
    } else {
        "0.00".to_string()
    };

    let mut seen = HashSet::new();
    let mut inbound_remarks = Vec::new();
    for record in records {
        if seen.insert(record.inbound_id) {
            inbound_remarks.push(record.inbound_remark.clone());
        }
    }

    AggregatedTraffic {
        total_up,
        total_down,
        total_used,
        total_limit,
        remaining,
        usage_percent,
        expiry_time: first.expiry_time,
        enabled: first.enabled,
        inbound_count: inbound_remarks.len(),
        inbound_remarks,
    }
}

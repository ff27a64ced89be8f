use anyhow::Result;
use reqwest::{header, Client as HttpClient, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::totp;

/// Total attempts per upstream call, first try included.
const RETRY_ATTEMPTS: u32 = 3;
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticated client for the panel's admin API.
#[derive(Clone)]
pub struct PanelClient {
    client: HttpClient,
    base_url: String,
    username: String,
    password: String,
    totp_secret: Option<String>,
    totp_enabled: bool,
}

/// Upstream session cookie, owned by the request that logged in.
pub struct Session {
    cookie: String,
}

impl PanelClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = HttpClient::builder().timeout(UPSTREAM_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: config.panel_base_url(),
            username: config.username.clone(),
            password: config.password.clone(),
            totp_secret: config.totp_secret.clone(),
            totp_enabled: config.totp_enabled,
        })
    }

    /// Exchange the operator credentials for a session cookie.
    ///
    /// A rejected login is an application-level result, not a transport
    /// failure, and is never retried.
    pub async fn login(&self) -> Result<Session, GatewayError> {
        let mut form = vec![
            ("username", self.username.clone()),
            ("password", self.password.clone()),
        ];
        if self.totp_enabled {
            if let Some(secret) = &self.totp_secret {
                form.push(("twoFactorCode", totp::current_code(secret)?));
            }
        }

        let request = self
            .client
            .post(format!("{}/login", self.base_url))
            .form(&form);
        let response = send_with_retry(request).await?;

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string());

        let result: LoginResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("decoding login response: {e}")))?;

        if !result.success {
            let msg = if result.msg.is_empty() {
                "login unsuccessful".to_string()
            } else {
                result.msg
            };
            return Err(GatewayError::AuthenticationFailed(msg));
        }

        match cookie {
            Some(cookie) => Ok(Session { cookie }),
            None => Err(GatewayError::SessionToken),
        }
    }

    /// Fetch every inbound with its embedded client list.
    ///
    /// An inbound whose settings blob fails to parse is skipped with a
    /// warning; the rest of the directory is still usable.
    pub async fn list_inbounds(&self, session: &Session) -> Result<Vec<Inbound>, GatewayError> {
        let request = self
            .client
            .get(format!("{}/panel/api/inbounds/list", self.base_url))
            .header(header::COOKIE, &session.cookie)
            .header(header::ACCEPT, "application/json");
        let response = send_with_retry(request).await?;

        let result: InboundListResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("decoding inbound list: {e}")))?;

        let mut inbounds = Vec::with_capacity(result.obj.len());
        for entry in result.obj {
            match parse_clients(&entry.settings) {
                Ok(clients) => inbounds.push(Inbound {
                    id: entry.id,
                    remark: entry.remark,
                    clients,
                }),
                Err(e) => {
                    warn!(inbound = entry.id, "skipping inbound with malformed settings: {e}");
                }
            }
        }
        Ok(inbounds)
    }

    /// Traffic counters for one client, looked up by email.
    pub async fn client_traffic(
        &self,
        session: &Session,
        email: &str,
    ) -> Result<ClientTraffic, GatewayError> {
        let request = self
            .client
            .get(format!(
                "{}/panel/api/inbounds/getClientTraffics/{}",
                self.base_url, email
            ))
            .header(header::COOKIE, &session.cookie)
            .header(header::ACCEPT, "application/json");
        let response = send_with_retry(request).await?;

        let result: TrafficResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("decoding traffic response: {e}")))?;

        result
            .obj
            .ok_or_else(|| GatewayError::Transport(format!("panel has no traffic for {email}")))
    }
}

/// Send a request, retrying transport failures and non-success statuses
/// up to [`RETRY_ATTEMPTS`] times. Callers see success or the last failure.
pub(crate) async fn send_with_retry(request: RequestBuilder) -> Result<Response, GatewayError> {
    let mut last_error = GatewayError::Transport("request not attempted".to_string());

    for attempt in 1..=RETRY_ATTEMPTS {
        let builder = request
            .try_clone()
            .ok_or_else(|| GatewayError::Transport("request is not retryable".to_string()))?;

        match builder.send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                last_error = GatewayError::Transport(format!(
                    "upstream returned status {}",
                    response.status()
                ));
            }
            Err(e) => last_error = GatewayError::Transport(e.to_string()),
        }

        if attempt < RETRY_ATTEMPTS {
            debug!(attempt, "retrying upstream request");
        }
    }

    Err(last_error)
}

fn parse_clients(settings: &str) -> Result<Vec<Client>, serde_json::Error> {
    let settings: InboundSettings = serde_json::from_str(settings)?;
    Ok(settings.clients)
}

// Wire types

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
struct InboundListResponse {
    #[serde(default)]
    obj: Vec<InboundEntry>,
}

#[derive(Debug, Deserialize)]
struct InboundEntry {
    id: i64,
    #[serde(default)]
    remark: String,
    /// JSON text embedding the client list.
    #[serde(default)]
    settings: String,
}

#[derive(Debug, Deserialize)]
struct InboundSettings {
    #[serde(default)]
    clients: Vec<Client>,
}

/// One inbound with its clients, as the rest of the pipeline sees it.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub id: i64,
    pub remark: String,
    pub clients: Vec<Client>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Client {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "subId", default)]
    pub sub_id: String,
}

#[derive(Debug, Deserialize)]
struct TrafficResponse {
    obj: Option<ClientTraffic>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientTraffic {
    #[serde(default)]
    pub up: i64,
    #[serde(default)]
    pub down: i64,
    #[serde(default)]
    pub total: i64,
    #[serde(rename = "expiryTime", default)]
    pub expiry_time: i64,
    #[serde(default)]
    pub enable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clients_from_settings_blob() {
        let settings = r#"{
            "clients": [
                {"id": "a-1", "email": "alice@in1", "subId": "sub-alice", "flow": ""},
                {"id": "b-2", "email": "bob@in1", "subId": "sub-bob"}
            ],
            "decryption": "none"
        }"#;

        let clients = parse_clients(settings).unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].sub_id, "sub-alice");
        assert_eq!(clients[1].email, "bob@in1");
    }

    #[test]
    fn malformed_settings_is_an_error_not_a_panic() {
        assert!(parse_clients("not json").is_err());
    }

    #[test]
    fn decodes_traffic_wire_shape() {
        let body = r#"{"success": true, "msg": "", "obj": {
            "up": 100, "down": 200, "total": 1000,
            "expiryTime": 1735689600000, "enable": true
        }}"#;

        let parsed: TrafficResponse = serde_json::from_str(body).unwrap();
        let traffic = parsed.obj.unwrap();
        assert_eq!(traffic.up, 100);
        assert_eq!(traffic.down, 200);
        assert_eq!(traffic.total, 1000);
        assert!(traffic.enable);
    }

    #[test]
    fn null_traffic_object_decodes_to_none() {
        let body = r#"{"success": false, "msg": "record not found", "obj": null}"#;
        let parsed: TrafficResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.obj.is_none());
    }
}

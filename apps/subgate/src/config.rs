use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Scheme the panel is reachable over, `http` or `https`.
    #[serde(default = "default_protocol")]
    pub panel_protocol: String,
    pub panel_host: String,
    #[serde(default = "default_panel_port")]
    pub panel_port: u16,
    /// Web base path of the panel, may be empty.
    #[serde(default)]
    pub panel_path: String,

    pub username: String,
    pub password: String,
    /// Base32 shared secret for the login one-time code.
    #[serde(default)]
    pub totp_secret: Option<String>,
    #[serde(default)]
    pub totp_enabled: bool,

    /// Content base URL; the subscription id is appended verbatim.
    pub subscription_url: String,
    /// Optional line prepended to automated subscription payloads.
    #[serde(default)]
    pub backup_link: String,

    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_panel_port() -> u16 {
    8080
}

fn default_listen_port() -> u16 {
    3000
}

impl GatewayConfig {
    pub fn load() -> Result<Self> {
        // Try to load from /etc/subgate/subgate.toml first
        let config_paths = vec!["/etc/subgate/subgate.toml", "./subgate.toml"];

        for path in config_paths {
            if let Ok(contents) = fs::read_to_string(path) {
                tracing::info!("Loading config from {}", path);
                return Ok(toml::from_str(&contents)?);
            }
        }

        // Fallback to environment variables
        tracing::info!("Loading config from environment");
        Ok(Self {
            panel_protocol: std::env::var("PANEL_PROTOCOL").unwrap_or_else(|_| default_protocol()),
            panel_host: std::env::var("PANEL_HOST")?,
            panel_port: std::env::var("PANEL_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(default_panel_port),
            panel_path: std::env::var("PANEL_PATH").unwrap_or_default(),
            username: std::env::var("PANEL_USERNAME")?,
            password: std::env::var("PANEL_PASSWORD")?,
            totp_secret: std::env::var("PANEL_TOTP_SECRET").ok(),
            totp_enabled: std::env::var("PANEL_TOTP_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            subscription_url: std::env::var("SUBSCRIPTION_URL")?,
            backup_link: std::env::var("BACKUP_LINK").unwrap_or_default(),
            listen_port: std::env::var("LISTEN_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(default_listen_port),
        })
    }

    /// Base URL of the panel API, without a trailing slash.
    pub fn panel_base_url(&self) -> String {
        let path = self.panel_path.trim_matches('/');
        if path.is_empty() {
            format!(
                "{}://{}:{}",
                self.panel_protocol, self.panel_host, self.panel_port
            )
        } else {
            format!(
                "{}://{}:{}/{}",
                self.panel_protocol, self.panel_host, self.panel_port, path
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml() {
        let config: GatewayConfig = toml::from_str(
            r#"
            panel_host = "10.0.0.5"
            username = "admin"
            password = "secret"
            subscription_url = "https://sub.example.com/sub/"
            "#,
        )
        .unwrap();

        assert_eq!(config.panel_protocol, "http");
        assert_eq!(config.panel_port, 8080);
        assert_eq!(config.listen_port, 3000);
        assert!(!config.totp_enabled);
        assert_eq!(config.backup_link, "");
        assert_eq!(config.panel_base_url(), "http://10.0.0.5:8080");
    }

    #[test]
    fn panel_base_url_includes_web_path() {
        let config: GatewayConfig = toml::from_str(
            r#"
            panel_protocol = "https"
            panel_host = "panel.example.com"
            panel_port = 2053
            panel_path = "/xui/"
            username = "admin"
            password = "secret"
            subscription_url = "https://sub.example.com/sub/"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.panel_base_url(),
            "https://panel.example.com:2053/xui"
        );
    }
}

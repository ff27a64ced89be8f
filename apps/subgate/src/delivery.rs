//! Response shaping: browser detection and subscription payload recomposition.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::GatewayError;

const BROWSER_KEYWORDS: [&str; 8] = [
    "Mozilla", "Chrome", "Safari", "Edge", "Opera", "Firefox", "Trident", "WebKit",
];

/// Case-sensitive substring match: any keyword hit means an interactive
/// (browser-like) requester; everything else is an automated client.
pub fn is_browser_agent(user_agent: &str) -> bool {
    BROWSER_KEYWORDS.iter().any(|kw| user_agent.contains(kw))
}

/// Decode the upstream base64 payload, prepend the backup link when one is
/// configured, and re-encode.
///
/// The decode→concat→encode path must be byte-exact: clients base64-decode
/// the body themselves. Upstream bodies often end in a newline, so the raw
/// text is trimmed before decoding.
pub fn compose_payload(raw: &str, backup_link: &str) -> Result<String, GatewayError> {
    let decoded = STANDARD
        .decode(raw.trim())
        .map_err(|e| GatewayError::PayloadEncoding(e.to_string()))?;
    let text = String::from_utf8(decoded)
        .map_err(|e| GatewayError::PayloadEncoding(e.to_string()))?;

    let combined = if backup_link.is_empty() {
        text
    } else {
        format!("{backup_link}\n{text}")
    };

    Ok(STANDARD.encode(combined))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browsers_are_interactive() {
        assert!(is_browser_agent(
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36"
        ));
        assert!(is_browser_agent("Chrome"));
    }

    #[test]
    fn tools_are_automated() {
        assert!(!is_browser_agent("curl/8.0"));
        assert!(!is_browser_agent("v2rayNG/1.8.6"));
        assert!(!is_browser_agent(""));
    }

    #[test]
    fn classification_is_case_sensitive() {
        assert!(!is_browser_agent("chrome"));
    }

    #[test]
    fn payload_roundtrips_without_backup_link() {
        let text = "vless://uuid@host:443?type=tcp#node-1\nvless://uuid@host2:443#node-2";
        let raw = STANDARD.encode(text);

        let out = compose_payload(&raw, "").unwrap();
        assert_eq!(STANDARD.decode(out).unwrap(), text.as_bytes());
    }

    #[test]
    fn backup_link_is_prepended_on_its_own_line() {
        let text = "vless://uuid@host:443#node-1";
        let raw = STANDARD.encode(text);

        let out = compose_payload(&raw, "https://backup.example.com/sub/u1").unwrap();
        let decoded = String::from_utf8(STANDARD.decode(out).unwrap()).unwrap();
        assert_eq!(decoded, "https://backup.example.com/sub/u1\nvless://uuid@host:443#node-1");
    }

    #[test]
    fn trailing_newline_in_upstream_body_is_tolerated() {
        let raw = format!("{}\n", STANDARD.encode("payload"));
        assert!(compose_payload(&raw, "").is_ok());
    }

    #[test]
    fn garbage_payload_is_an_encoding_error() {
        assert!(matches!(
            compose_payload("!!! not base64 !!!", ""),
            Err(GatewayError::PayloadEncoding(_))
        ));
    }
}

//! One-time code generation for the panel login step-up.

use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::GatewayError;

/// Compute the current one-time code from a base32 shared secret.
///
/// RFC 6238 defaults, matching the panel's verifier: SHA-1, 6 digits,
/// 30-second step. The ±1 step skew window is the verifier's to apply;
/// we always submit the code for the current step.
pub fn current_code(secret_base32: &str) -> Result<String, GatewayError> {
    let secret = Secret::Encoded(secret_base32.trim().to_string())
        .to_bytes()
        .map_err(|e| GatewayError::Totp(format!("invalid shared secret: {e:?}")))?;

    let totp = TOTP::new(
        Algorithm::SHA1, // RFC 6238 default
        6,               // digits
        1,               // skew (±1 step)
        30,              // step seconds
        secret,
    )
    .map_err(|e| GatewayError::Totp(format!("TOTP init: {e:?}")))?;

    totp.generate_current()
        .map_err(|e| GatewayError::Totp(format!("system clock: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_six_digit_code() {
        // "Hello!" x2 in base32, a well-known RFC 4648 test vector shape.
        let code = current_code("JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn rejects_invalid_base32() {
        assert!(current_code("not base32 at all!!").is_err());
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        assert!(current_code("  JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP\n").is_ok());
    }
}

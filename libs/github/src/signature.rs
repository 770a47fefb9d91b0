//! Webhook signature verification.
//!
//! GitHub signs each delivery with HMAC-SHA256 over the exact request body
//! and sends `sha256=<hex digest>` in [`crate::SIGNATURE_HEADER`]. The check
//! must run on the raw bytes; re-serializing a parsed payload is not
//! byte-identical.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Required prefix of the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Verify `signature` against the HMAC-SHA256 of `payload` keyed by `secret`.
///
/// Failures are logged under the `security` target together with `caller`
/// (normally the client IP). Successes are not logged. The digest comparison
/// is constant time.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature: &str,
    secret: &[u8],
    caller: &str,
) -> bool {
    let Some(hex_digest) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        warn!(target: "security", client_ip = %caller, "Invalid webhook signature format");
        return false;
    };

    let Ok(provided) = hex::decode(hex_digest) else {
        warn!(target: "security", client_ip = %caller, "Webhook signature mismatch");
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        warn!(target: "security", client_ip = %caller, "Webhook secret rejected by HMAC");
        return false;
    };
    mac.update(payload);

    if mac.verify_slice(&provided).is_err() {
        warn!(target: "security", client_ip = %caller, "Webhook signature mismatch");
        return false;
    }

    true
}

/// Compute the header value GitHub would send for `payload`.
pub fn sign_payload(payload: &[u8], secret: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload);
    Some(format!(
        "{SIGNATURE_PREFIX}{}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

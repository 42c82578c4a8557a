use chrono::Utc;
use log::warn;
use std::time::Duration;

use crate::models::TokenClaims;

/// Decode the claims of a JWT without verifying its signature.
/// Verification is the backend's job when the token is presented back to it.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        warn!("Invalid JWT format: expected 3 parts");
        return None;
    }

    let decoded = match base64_url_decode(parts[1]) {
        Ok(d) => d,
        Err(e) => {
            warn!("Failed to decode JWT payload: {}", e);
            return None;
        }
    };

    match serde_json::from_slice::<TokenClaims>(&decoded) {
        Ok(claims) => Some(claims),
        Err(e) => {
            warn!("Failed to parse JWT payload JSON: {}", e);
            None
        }
    }
}

/// Decode the exp (expiration) claim, in seconds since Unix epoch
pub fn decode_exp(token: &str) -> Option<i64> {
    decode_claims(token).map(|claims| claims.exp)
}

pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A token whose exp is at or before `now` is expired
pub fn is_expired_at(exp_secs: i64, now_secs: i64) -> bool {
    exp_secs <= now_secs
}

/// Undecodable tokens count as expired
pub fn is_token_expired(token: &str) -> bool {
    match decode_exp(token) {
        Some(exp) => is_expired_at(exp, now_secs()),
        None => true,
    }
}

/// Seconds until token expiry, `None` if invalid or already expired
pub fn seconds_until_expiry(token: &str) -> Option<i64> {
    let exp = decode_exp(token)?;
    let seconds = exp - now_secs();

    if seconds <= 0 { None } else { Some(seconds) }
}

/// Delay before renewing a token expiring at `exp_secs`: `exp - now - margin`, floored at zero
pub fn renewal_delay(exp_secs: i64, now_millis: i64, margin: Duration) -> Duration {
    let margin_millis = i64::try_from(margin.as_millis()).unwrap_or(i64::MAX);
    let delay = exp_secs
        .saturating_mul(1000)
        .saturating_sub(now_millis)
        .saturating_sub(margin_millis);

    Duration::from_millis(u64::try_from(delay).unwrap_or(0))
}

/// Decode base64url string (JWT uses base64url, not standard base64)
fn base64_url_decode(input: &str) -> Result<Vec<u8>, String> {
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

    URL_SAFE_NO_PAD
        .decode(input.trim_end_matches('='))
        .map_err(|e| format!("Base64 decode error: {}", e))
}

#[cfg(test)]
pub(crate) fn encode_unsigned_token(claims: &serde_json::Value) -> String {
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

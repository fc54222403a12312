//! Admin session tokens.
//!
//! `POST /api/admin/login` checks the configured admin password and issues
//! a signed token `"{expiry_unix}.{hex(hmac_sha256(secret, "admin:{expiry}"))}"`.
//! Admin handlers call `require_admin` with the Authorization header and
//! get an `AdminContext` back; everything else is a 401.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

/// Token lifetime (24 hours).
pub const TOKEN_TTL_SECS: i64 = 86400;

/// Proof that the request carried a valid, unexpired admin token.
#[derive(Debug, Clone, Copy)]
pub struct AdminContext {
    pub expires_at: i64,
}

fn sign(secret: &str, expires_at: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(format!("admin:{expires_at}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Issue a token expiring `TOKEN_TTL_SECS` after `now_unix`.
pub fn issue_token(secret: &str, now_unix: i64) -> (String, i64) {
    let expires_at = now_unix + TOKEN_TTL_SECS;
    (format!("{expires_at}.{}", sign(secret, expires_at)), expires_at)
}

/// Verify a raw token string against the secret and the current time.
pub fn verify_token(token: &str, secret: &str, now_unix: i64) -> Option<AdminContext> {
    let (expiry_part, sig_part) = token.split_once('.')?;
    let expires_at: i64 = expiry_part.parse().ok()?;
    if expires_at <= now_unix {
        return None;
    }

    let expected = sign(secret, expires_at);
    // hex output is fixed-length lowercase; compare without early exit
    let matches = expected.len() == sig_part.len()
        && expected
            .bytes()
            .zip(sig_part.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0;
    if !matches {
        return None;
    }

    Some(AdminContext { expires_at })
}

/// Extract and verify the `Authorization: Bearer <token>` header.
pub fn require_admin(
    auth_header: Option<&str>,
    secret: &str,
) -> Result<AdminContext, ApiError> {
    let header = auth_header
        .ok_or_else(|| ApiError::Auth("missing Authorization header".into()))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Auth("expected a bearer token".into()))?;
    verify_token(token, secret, chrono::Utc::now().timestamp())
        .ok_or_else(|| ApiError::Auth("invalid or expired admin token".into()))
}

// ── Tests ──

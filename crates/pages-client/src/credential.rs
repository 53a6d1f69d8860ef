//! Upload JWT inspection.
//!
//! The upload token is opaque except for its `exp` claim, which is read
//! from the payload segment without verifying the signature.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde::Deserialize;

use crate::error::ClientError;

#[derive(Deserialize)]
struct Claims {
    exp: i64,
}

/// A bearer upload token together with its decoded expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCredential {
    token: String,
    expires_at: i64,
}

impl UploadCredential {
    /// Parses the `exp` claim out of `token`.
    pub fn from_jwt(token: impl Into<String>) -> Result<Self, ClientError> {
        let token = token.into();
        let expires_at = decode_expiry(&token)?;
        Ok(Self { token, expires_at })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Expiry as epoch seconds.
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// True once `now` (epoch seconds) has reached the expiry.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }
}

/// Checks a raw JWT against `now` (epoch seconds).
///
/// Malformed tokens are reported as [`ErrorKind::Auth`](crate::ErrorKind::Auth)
/// errors so the caller refreshes instead of retrying with the same token.
pub fn is_jwt_expired(token: &str, now: i64) -> Result<bool, ClientError> {
    Ok(decode_expiry(token)? <= now)
}

fn decode_expiry(token: &str) -> Result<i64, ClientError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| ClientError::auth("invalid token: missing payload segment"))?;
    let payload = payload.trim_end_matches('=');

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .map_err(|e| ClientError::auth(format!("invalid token: {e}")))?;

    let claims: Claims = serde_json::from_slice(&bytes)
        .map_err(|e| ClientError::auth(format!("invalid token: {e}")))?;
    Ok(claims.exp)
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use docflow_core::UserId;

/// Auth claims model (transport-agnostic).
///
/// The minimal set of claims docflow expects once a credential has been
/// decoded/verified by whatever token layer is in use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    /// Login name, for logging and display.
    pub username: String,

    /// Role names granted at issuance time.
    pub roles: Vec<String>,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("credential has expired")]
    Expired,

    #[error("credential not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid credential time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate auth claims.
///
/// Note: this validates the *claims* only. Signature verification/decoding is
/// intentionally outside this crate.
pub fn validate_claims(claims: &AuthClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

//! Token issuance contract.
//!
//! Issuance, signing and refresh-token persistence are collaborator concerns;
//! this module only fixes the contract the rest of the system relies on:
//! access/refresh pairs, longer expiries under a "remember" flag, and refresh
//! **rotation** (a refresh credential is single-use; exchanging it invalidates
//! it and reusing it must fail).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use docflow_core::{DomainError, UserId};

use crate::claims::AuthClaims;

/// An access/refresh credential pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Token lifetimes; the `remember` profile is deliberately longer.
#[derive(Debug, Clone, Copy)]
pub struct TokenConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub remember_access_ttl: Duration,
    pub remember_refresh_ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_ttl: Duration::hours(1),
            refresh_ttl: Duration::days(1),
            remember_access_ttl: Duration::hours(12),
            remember_refresh_ttl: Duration::days(30),
        }
    }
}

impl TokenConfig {
    pub fn access_ttl_for(&self, remember: bool) -> Duration {
        if remember {
            self.remember_access_ttl
        } else {
            self.access_ttl
        }
    }

    pub fn refresh_ttl_for(&self, remember: bool) -> Duration {
        if remember {
            self.remember_refresh_ttl
        } else {
            self.refresh_ttl
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("credential has expired")]
    Expired,

    #[error("credential is invalid")]
    Invalid,

    #[error("credential does not belong to the expected subject")]
    SubjectMismatch,
}

impl From<TokenError> for DomainError {
    fn from(value: TokenError) -> Self {
        DomainError::unauthenticated(value.to_string())
    }
}

/// Issues and validates credentials.
///
/// Subject extraction (`subject_of`) and validating a credential against a
/// known identity (`validate_for`) are separate operations on purpose: the
/// middleware needs the former, ownership checks need the latter.
pub trait TokenIssuer: Send + Sync {
    /// Issue a fresh access+refresh pair for an authenticated user.
    fn issue(
        &self,
        user: UserId,
        username: &str,
        roles: &[String],
        remember: bool,
    ) -> Result<TokenPair, TokenError>;

    /// Exchange a refresh credential for a new pair, rotating the old one.
    ///
    /// A previously-exchanged (or expired) refresh credential yields
    /// `TokenError::Expired`/`Invalid`; new tokens are never issued for it.
    fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TokenError>;

    /// Decode the subject claims from an access credential.
    fn subject_of(&self, access_token: &str) -> Result<AuthClaims, TokenError>;

    /// Validate that an access credential belongs to `user`.
    fn validate_for(&self, access_token: &str, user: UserId) -> Result<(), TokenError>;
}

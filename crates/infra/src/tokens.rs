//! HS256 token issuer with rotating refresh credentials.
//!
//! Access tokens are signed JWTs carrying the subject, username and role
//! names. Refresh tokens are opaque one-time handles held server-side;
//! exchanging one removes it before the replacement is inserted, so a replayed
//! refresh token always fails.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docflow_core::UserId;
use docflow_identity::{AuthClaims, TokenConfig, TokenError, TokenIssuer, TokenPair};

#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    sub: String,
    username: String,
    roles: Vec<String>,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
struct RefreshRecord {
    user: UserId,
    username: String,
    roles: Vec<String>,
    remember: bool,
    expires_at: DateTime<Utc>,
}

/// Symmetric-key issuer backed by an in-memory refresh session table.
pub struct HsTokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    config: TokenConfig,
    sessions: RwLock<HashMap<String, RefreshRecord>>,
}

impl HsTokenIssuer {
    pub fn new(secret: &[u8], config: TokenConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn issue_at(
        &self,
        now: DateTime<Utc>,
        user: UserId,
        username: &str,
        roles: &[String],
        remember: bool,
    ) -> Result<TokenPair, TokenError> {
        let access_expires_at = now + self.config.access_ttl_for(remember);
        let refresh_expires_at = now + self.config.refresh_ttl_for(remember);

        let claims = JwtClaims {
            sub: user.to_string(),
            username: username.to_string(),
            roles: roles.to_vec(),
            iat: now.timestamp(),
            exp: access_expires_at.timestamp(),
        };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|_| TokenError::Invalid)?;

        let refresh_token = Uuid::now_v7().to_string();
        let record = RefreshRecord {
            user,
            username: username.to_string(),
            roles: roles.to_vec(),
            remember,
            expires_at: refresh_expires_at,
        };
        self.sessions
            .write()
            .map_err(|_| TokenError::Invalid)?
            .insert(refresh_token.clone(), record);

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }
}

impl TokenIssuer for HsTokenIssuer {
    fn issue(
        &self,
        user: UserId,
        username: &str,
        roles: &[String],
        remember: bool,
    ) -> Result<TokenPair, TokenError> {
        self.issue_at(Utc::now(), user, username, roles, remember)
    }

    fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        // Remove first: whatever happens next, the old handle is spent.
        let record = self
            .sessions
            .write()
            .map_err(|_| TokenError::Invalid)?
            .remove(refresh_token)
            .ok_or(TokenError::Invalid)?;

        let now = Utc::now();
        if now >= record.expires_at {
            return Err(TokenError::Expired);
        }

        self.issue_at(now, record.user, &record.username, &record.roles, record.remember)
    }

    fn subject_of(&self, access_token: &str) -> Result<AuthClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<JwtClaims>(access_token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        let sub = UserId::from_str(&data.claims.sub).map_err(|_| TokenError::Invalid)?;
        let issued_at =
            DateTime::<Utc>::from_timestamp(data.claims.iat, 0).ok_or(TokenError::Invalid)?;
        let expires_at =
            DateTime::<Utc>::from_timestamp(data.claims.exp, 0).ok_or(TokenError::Invalid)?;

        Ok(AuthClaims {
            sub,
            username: data.claims.username,
            roles: data.claims.roles,
            issued_at,
            expires_at,
        })
    }

    fn validate_for(&self, access_token: &str, user: UserId) -> Result<(), TokenError> {
        let claims = self.subject_of(access_token)?;
        if claims.sub != user {
            return Err(TokenError::SubjectMismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> HsTokenIssuer {
        HsTokenIssuer::new(b"test-secret-not-for-production", TokenConfig::default())
    }

    #[test]
    fn issued_access_token_decodes_to_the_same_subject() {
        let iss = issuer();
        let user = UserId::new();
        let pair = iss
            .issue(user, "an.nguyen", &["user".to_string()], false)
            .unwrap();

        let claims = iss.subject_of(&pair.access_token).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.username, "an.nguyen");
        assert_eq!(claims.roles, vec!["user".to_string()]);
    }

    #[test]
    fn remember_profile_extends_expiries() {
        let iss = issuer();
        let user = UserId::new();
        let short = iss.issue(user, "u", &[], false).unwrap();
        let long = iss.issue(user, "u", &[], true).unwrap();
        assert!(long.access_expires_at > short.access_expires_at);
        assert!(long.refresh_expires_at > short.refresh_expires_at);
    }

    #[test]
    fn refresh_rotates_and_reuse_fails() {
        let iss = issuer();
        let user = UserId::new();
        let first = iss.issue(user, "u", &["user".to_string()], false).unwrap();

        let second = iss.refresh(&first.refresh_token).unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);

        // The exchanged handle is spent.
        let err = iss.refresh(&first.refresh_token).unwrap_err();
        assert_eq!(err, TokenError::Invalid);

        // The replacement still works exactly once.
        assert!(iss.refresh(&second.refresh_token).is_ok());
        assert_eq!(
            iss.refresh(&second.refresh_token).unwrap_err(),
            TokenError::Invalid
        );
    }

    #[test]
    fn unknown_refresh_token_is_invalid() {
        let iss = issuer();
        assert_eq!(
            iss.refresh(&Uuid::now_v7().to_string()).unwrap_err(),
            TokenError::Invalid
        );
    }

    #[test]
    fn validate_for_rejects_a_different_subject() {
        let iss = issuer();
        let owner = UserId::new();
        let pair = iss.issue(owner, "owner", &[], false).unwrap();

        assert!(iss.validate_for(&pair.access_token, owner).is_ok());
        assert_eq!(
            iss.validate_for(&pair.access_token, UserId::new())
                .unwrap_err(),
            TokenError::SubjectMismatch
        );
    }

    #[test]
    fn garbage_access_token_is_invalid() {
        let iss = issuer();
        assert_eq!(
            iss.subject_of("not.a.jwt").unwrap_err(),
            TokenError::Invalid
        );
    }
}

//! Access control resolver.
//!
//! The single choke point that turns an authenticated identity into the
//! current `User`. Identity is an explicit argument; no component reads an
//! ambient security context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docflow_core::{DepartmentId, DomainError, DomainResult, UserId};
use docflow_org::RoleId;

use crate::claims::{AuthClaims, validate_claims};
use crate::user::UserStatus;

/// The resolved current user, as seen by services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedUser {
    pub user_id: UserId,
    pub username: String,
    pub display_name: String,
    pub roles: Vec<RoleId>,
    pub department: Option<DepartmentId>,
    pub status: UserStatus,
}

/// Lookup surface the resolver needs (backed by the users read model).
pub trait UserDirectory {
    fn user_by_id(&self, id: UserId) -> Option<ResolvedUser>;
    fn user_by_username(&self, username: &str) -> Option<ResolvedUser>;
}

/// Resolve the caller's user entity from the presented identity.
///
/// - no identity → `Unauthenticated`
/// - expired/invalid claims → `Unauthenticated`
/// - subject does not map to a known user (stale/revoked session) → `NotFound`
/// - disabled or not-yet-approved account → `Forbidden`
pub fn resolve_current_user(
    identity: Option<&AuthClaims>,
    now: DateTime<Utc>,
    directory: &impl UserDirectory,
) -> DomainResult<ResolvedUser> {
    let claims = identity.ok_or_else(|| DomainError::unauthenticated("no identity presented"))?;

    validate_claims(claims, now).map_err(|e| DomainError::unauthenticated(e.to_string()))?;

    let user = directory
        .user_by_id(claims.sub)
        .ok_or(DomainError::NotFound)?;

    match user.status {
        UserStatus::Active => Ok(user),
        UserStatus::PendingApproval => Err(DomainError::forbidden("account is pending approval")),
        UserStatus::Disabled => Err(DomainError::forbidden("account is disabled")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashMap;

    struct MapDirectory(HashMap<UserId, ResolvedUser>);

    impl UserDirectory for MapDirectory {
        fn user_by_id(&self, id: UserId) -> Option<ResolvedUser> {
            self.0.get(&id).cloned()
        }

        fn user_by_username(&self, username: &str) -> Option<ResolvedUser> {
            self.0.values().find(|u| u.username == username).cloned()
        }
    }

    fn user(status: UserStatus) -> ResolvedUser {
        ResolvedUser {
            user_id: UserId::new(),
            username: "an.nguyen".to_string(),
            display_name: "Nguyen Van An".to_string(),
            roles: vec![RoleId::new()],
            department: None,
            status,
        }
    }

    fn claims_for(user: &ResolvedUser, now: DateTime<Utc>) -> AuthClaims {
        AuthClaims {
            sub: user.user_id,
            username: user.username.clone(),
            roles: vec!["user".to_string()],
            issued_at: now - Duration::minutes(1),
            expires_at: now + Duration::hours(1),
        }
    }

    #[test]
    fn missing_identity_is_unauthenticated() {
        let dir = MapDirectory(HashMap::new());
        let err = resolve_current_user(None, Utc::now(), &dir).unwrap_err();
        assert!(matches!(err, DomainError::Unauthenticated(_)));
    }

    #[test]
    fn expired_claims_are_unauthenticated() {
        let now = Utc::now();
        let u = user(UserStatus::Active);
        let mut claims = claims_for(&u, now);
        claims.expires_at = now - Duration::minutes(1);
        let dir = MapDirectory(HashMap::from([(u.user_id, u)]));

        let err = resolve_current_user(Some(&claims), now, &dir).unwrap_err();
        assert!(matches!(err, DomainError::Unauthenticated(_)));
    }

    #[test]
    fn unknown_subject_is_not_found() {
        let now = Utc::now();
        let u = user(UserStatus::Active);
        let claims = claims_for(&u, now);
        let dir = MapDirectory(HashMap::new());

        let err = resolve_current_user(Some(&claims), now, &dir).unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn disabled_account_is_forbidden() {
        let now = Utc::now();
        let u = user(UserStatus::Disabled);
        let claims = claims_for(&u, now);
        let dir = MapDirectory(HashMap::from([(u.user_id, u)]));

        let err = resolve_current_user(Some(&claims), now, &dir).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn active_account_resolves() {
        let now = Utc::now();
        let u = user(UserStatus::Active);
        let claims = claims_for(&u, now);
        let dir = MapDirectory(HashMap::from([(u.user_id, u.clone())]));

        let resolved = resolve_current_user(Some(&claims), now, &dir).unwrap();
        assert_eq!(resolved.user_id, u.user_id);
    }
}

//! Login, refresh and current-user resolution.
//!
//! Credential verification against an external identity provider happens
//! before `login` is called; this controller owns what follows: the account
//! status gate, the audit login event, and token issuance.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use docflow_core::{AggregateId, DomainError, DomainResult, UserId};
use docflow_events::{EventBus, EventEnvelope};
use docflow_identity::user::RecordLogin;
use docflow_identity::{ResolvedUser, TokenIssuer, TokenPair, User, UserCommand, resolve_current_user};
use docflow_org::{PermissionId, RoleId};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::projections::{
    PermissionReadModel, RoleReadModel, RolesProjection, UserReadModel, UsersProjection,
};
use crate::read_model::KeyedStore;

/// Stream type identifier for user aggregates.
pub const USER_AGGREGATE: &str = "identity.user";

/// Event stream id for a user aggregate.
pub fn user_stream(user_id: UserId) -> AggregateId {
    AggregateId::from(Uuid::from(user_id))
}

pub struct AccessController<'a, S, B, U, R, P>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    U: KeyedStore<UserId, UserReadModel>,
    R: KeyedStore<RoleId, RoleReadModel>,
    P: KeyedStore<PermissionId, PermissionReadModel>,
{
    dispatcher: &'a CommandDispatcher<S, B>,
    users: UsersProjection<U>,
    roles: RolesProjection<R, P>,
    issuer: Arc<dyn TokenIssuer>,
}

impl<'a, S, B, U, R, P> AccessController<'a, S, B, U, R, P>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    U: KeyedStore<UserId, UserReadModel>,
    R: KeyedStore<RoleId, RoleReadModel>,
    P: KeyedStore<PermissionId, PermissionReadModel>,
{
    pub fn new(
        dispatcher: &'a CommandDispatcher<S, B>,
        users: UsersProjection<U>,
        roles: RolesProjection<R, P>,
        issuer: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            dispatcher,
            users,
            roles,
            issuer,
        }
    }

    /// Complete a login for an already credential-verified username.
    ///
    /// Pending or disabled accounts are rejected by the user aggregate; a
    /// successful dispatch records the login event before tokens are issued.
    pub fn login(
        &self,
        username: &str,
        remember: bool,
    ) -> Result<(ResolvedUser, TokenPair), DispatchError> {
        let user = self
            .users
            .by_username(username)
            .ok_or_else(|| DispatchError::Unauthenticated("unknown user".to_string()))?;

        self.dispatcher.dispatch::<User>(
            user_stream(user.user_id),
            USER_AGGREGATE,
            UserCommand::RecordLogin(RecordLogin {
                user_id: user.user_id,
                occurred_at: Utc::now(),
            }),
            |_| User::empty(user.user_id),
        )?;

        let role_names = self.roles.role_names(&user.roles);
        let pair = self
            .issuer
            .issue(user.user_id, &user.username, &role_names, remember)
            .map_err(DomainError::from)?;

        Ok((user.resolved(), pair))
    }

    /// Exchange a refresh credential for a new pair (rotation).
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, DispatchError> {
        Ok(self
            .issuer
            .refresh(refresh_token)
            .map_err(DomainError::from)?)
    }

    /// Resolve the caller behind a bearer access token.
    pub fn current_user(&self, bearer: Option<&str>) -> DomainResult<ResolvedUser> {
        let claims = match bearer {
            Some(token) => Some(self.issuer.subject_of(token).map_err(DomainError::from)?),
            None => None,
        };
        resolve_current_user(claims.as_ref(), Utc::now(), &self.users)
    }
}

//! Users projection (identity read models).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docflow_core::{DepartmentId, UserId};
use docflow_events::EventEnvelope;
use docflow_identity::user::{
    UserApproved, UserDepartmentChanged, UserDisabled, UserLoggedIn, UserRegistered,
    UserRoleAssigned, UserRoleRevoked,
};
use docflow_identity::{ResolvedUser, UserDirectory, UserEvent, UserStatus};
use docflow_org::RoleId;

use crate::read_model::KeyedStore;

/// User read model for queries and access resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReadModel {
    pub user_id: UserId,
    pub username: String,
    pub display_name: String,
    pub roles: Vec<RoleId>,
    pub department: Option<DepartmentId>,
    pub status: UserStatus,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserReadModel {
    pub fn resolved(&self) -> ResolvedUser {
        ResolvedUser {
            user_id: self.user_id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            roles: self.roles.clone(),
            department: self.department,
            status: self.status,
        }
    }
}

/// Projection that maintains the user directory.
pub struct UsersProjection<S> {
    store: S,
}

impl<S> UsersProjection<S>
where
    S: KeyedStore<UserId, UserReadModel>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn by_id(&self, id: UserId) -> Option<UserReadModel> {
        self.store.get(&id)
    }

    pub fn by_username(&self, username: &str) -> Option<UserReadModel> {
        let needle = username.trim().to_lowercase();
        self.store.list().into_iter().find(|u| u.username == needle)
    }

    pub fn all(&self) -> Vec<UserReadModel> {
        self.store.list()
    }

    /// Users currently attached to `department`.
    pub fn in_department(&self, department: DepartmentId) -> Vec<UserReadModel> {
        self.store
            .list()
            .into_iter()
            .filter(|u| u.department == Some(department))
            .collect()
    }

    /// How many users currently hold `role` (delete-role precondition input).
    pub fn count_with_role(&self, role: RoleId) -> u64 {
        self.store
            .list()
            .iter()
            .filter(|u| u.roles.contains(&role))
            .count() as u64
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<serde_json::Value>,
    ) -> Result<(), anyhow::Error> {
        if !envelope.aggregate_type().starts_with("identity.user") {
            return Ok(());
        }

        let event: UserEvent = serde_json::from_value(envelope.payload().clone())?;
        match event {
            UserEvent::Registered(e) => self.apply_registered(e),
            UserEvent::Approved(e) => self.apply_approved(e),
            UserEvent::Disabled(e) => self.apply_disabled(e),
            UserEvent::RoleAssigned(e) => self.apply_role_assigned(e),
            UserEvent::RoleRevoked(e) => self.apply_role_revoked(e),
            UserEvent::DepartmentChanged(e) => self.apply_department_changed(e),
            UserEvent::LoggedIn(e) => self.apply_logged_in(e),
        }
        Ok(())
    }

    fn apply_registered(&self, e: UserRegistered) {
        let model = UserReadModel {
            user_id: e.user_id,
            username: e.username,
            display_name: e.display_name,
            roles: e.roles.into_iter().collect(),
            department: None,
            status: e.status,
            last_login: None,
            created_at: e.occurred_at,
            updated_at: e.occurred_at,
        };
        self.store.upsert(e.user_id, model);
    }

    fn apply_approved(&self, e: UserApproved) {
        self.touch(e.user_id, e.occurred_at, |m| {
            m.status = UserStatus::Active;
        });
    }

    fn apply_disabled(&self, e: UserDisabled) {
        self.touch(e.user_id, e.occurred_at, |m| {
            m.status = UserStatus::Disabled;
        });
    }

    fn apply_role_assigned(&self, e: UserRoleAssigned) {
        self.touch(e.user_id, e.occurred_at, |m| {
            if !m.roles.contains(&e.role) {
                m.roles.push(e.role);
            }
        });
    }

    fn apply_role_revoked(&self, e: UserRoleRevoked) {
        self.touch(e.user_id, e.occurred_at, |m| {
            m.roles.retain(|r| *r != e.role);
        });
    }

    fn apply_department_changed(&self, e: UserDepartmentChanged) {
        self.touch(e.user_id, e.occurred_at, |m| {
            m.department = e.department;
        });
    }

    fn apply_logged_in(&self, e: UserLoggedIn) {
        self.touch(e.user_id, e.occurred_at, |m| {
            m.last_login = Some(e.occurred_at);
        });
    }

    fn touch(&self, user_id: UserId, at: DateTime<Utc>, f: impl FnOnce(&mut UserReadModel)) {
        if let Some(mut model) = self.store.get(&user_id) {
            f(&mut model);
            model.updated_at = at;
            self.store.upsert(user_id, model);
        }
    }
}

impl<S> UserDirectory for UsersProjection<S>
where
    S: KeyedStore<UserId, UserReadModel>,
{
    fn user_by_id(&self, id: UserId) -> Option<ResolvedUser> {
        self.by_id(id).map(|m| m.resolved())
    }

    fn user_by_username(&self, username: &str) -> Option<ResolvedUser> {
        self.by_username(username).map(|m| m.resolved())
    }
}

//! User aggregate for identity management.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docflow_core::{Aggregate, AggregateRoot, DepartmentId, DomainError, UserId};
use docflow_events::Event;
use docflow_org::RoleId;

/// User account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// Freshly registered; cannot act until an administrator approves.
    #[default]
    PendingApproval,
    /// Approved; can authenticate and act.
    Active,
    /// Locked out; cannot authenticate.
    Disabled,
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UserStatus::PendingApproval => write!(f, "pending_approval"),
            UserStatus::Active => write!(f, "active"),
            UserStatus::Disabled => write!(f, "disabled"),
        }
    }
}

/// User aggregate.
///
/// # Invariants
/// - Registration always yields `PendingApproval`, whatever status the request
///   carried.
/// - A user always holds at least one role; registration substitutes the
///   baseline role when none were supplied.
/// - Disabled users cannot be granted roles or record logins.
/// - Department membership is one-at-a-time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub roles: BTreeSet<RoleId>,
    pub department: Option<DepartmentId>,
    pub status: UserStatus,
    pub last_login: Option<DateTime<Utc>>,
    pub version: u64,
    pub created: bool,
}

impl User {
    /// Create an empty, not-yet-registered instance for rehydration.
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            username: String::new(),
            display_name: String::new(),
            roles: BTreeSet::new(),
            department: None,
            status: UserStatus::PendingApproval,
            last_login: None,
            version: 0,
            created: false,
        }
    }

    fn ensure_registered(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }

    fn ensure_not_disabled(&self) -> Result<(), DomainError> {
        if self.status == UserStatus::Disabled {
            return Err(DomainError::forbidden("user is disabled"));
        }
        Ok(())
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Command to register a new user.
///
/// `requested_status` is carried only so the invariant is visible at the
/// boundary: whatever the client asked for, the account starts
/// `PendingApproval`. `baseline_role` is resolved by the caller from the
/// catalog's system "user" role and substituted when `roles` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterUser {
    pub user_id: UserId,
    pub username: String,
    pub display_name: String,
    pub requested_status: Option<UserStatus>,
    pub roles: BTreeSet<RoleId>,
    pub baseline_role: RoleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveUser {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableUser {
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignRole {
    pub user_id: UserId,
    pub role: RoleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeRole {
    pub user_id: UserId,
    pub role: RoleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDepartment {
    pub user_id: UserId,
    pub department: Option<DepartmentId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLogin {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserCommand {
    Register(RegisterUser),
    Approve(ApproveUser),
    Disable(DisableUser),
    AssignRole(AssignRole),
    RevokeRole(RevokeRole),
    SetDepartment(SetDepartment),
    RecordLogin(RecordLogin),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user_id: UserId,
    pub username: String,
    pub display_name: String,
    /// Always `PendingApproval`; recorded for audit symmetry.
    pub status: UserStatus,
    pub roles: BTreeSet<RoleId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserApproved {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDisabled {
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoleAssigned {
    pub user_id: UserId,
    pub role: RoleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoleRevoked {
    pub user_id: UserId,
    pub role: RoleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDepartmentChanged {
    pub user_id: UserId,
    pub department: Option<DepartmentId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLoggedIn {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    Registered(UserRegistered),
    Approved(UserApproved),
    Disabled(UserDisabled),
    RoleAssigned(UserRoleAssigned),
    RoleRevoked(UserRoleRevoked),
    DepartmentChanged(UserDepartmentChanged),
    LoggedIn(UserLoggedIn),
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Registered(_) => "identity.user.registered",
            UserEvent::Approved(_) => "identity.user.approved",
            UserEvent::Disabled(_) => "identity.user.disabled",
            UserEvent::RoleAssigned(_) => "identity.user.role_assigned",
            UserEvent::RoleRevoked(_) => "identity.user.role_revoked",
            UserEvent::DepartmentChanged(_) => "identity.user.department_changed",
            UserEvent::LoggedIn(_) => "identity.user.logged_in",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Registered(e) => e.occurred_at,
            UserEvent::Approved(e) => e.occurred_at,
            UserEvent::Disabled(e) => e.occurred_at,
            UserEvent::RoleAssigned(e) => e.occurred_at,
            UserEvent::RoleRevoked(e) => e.occurred_at,
            UserEvent::DepartmentChanged(e) => e.occurred_at,
            UserEvent::LoggedIn(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Registered(e) => {
                self.id = e.user_id;
                self.username = e.username.clone();
                self.display_name = e.display_name.clone();
                self.roles = e.roles.clone();
                self.status = e.status;
                self.created = true;
            }
            UserEvent::Approved(_) => {
                self.status = UserStatus::Active;
            }
            UserEvent::Disabled(_) => {
                self.status = UserStatus::Disabled;
            }
            UserEvent::RoleAssigned(e) => {
                self.roles.insert(e.role);
            }
            UserEvent::RoleRevoked(e) => {
                self.roles.remove(&e.role);
            }
            UserEvent::DepartmentChanged(e) => {
                self.department = e.department;
            }
            UserEvent::LoggedIn(e) => {
                self.last_login = Some(e.occurred_at);
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Register(cmd) => self.handle_register(cmd),
            UserCommand::Approve(cmd) => self.handle_approve(cmd),
            UserCommand::Disable(cmd) => self.handle_disable(cmd),
            UserCommand::AssignRole(cmd) => self.handle_assign_role(cmd),
            UserCommand::RevokeRole(cmd) => self.handle_revoke_role(cmd),
            UserCommand::SetDepartment(cmd) => self.handle_set_department(cmd),
            UserCommand::RecordLogin(cmd) => self.handle_record_login(cmd),
        }
    }
}

impl User {
    fn handle_register(&self, cmd: &RegisterUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("user already registered"));
        }
        if cmd.username.trim().is_empty() {
            return Err(DomainError::validation("username cannot be empty"));
        }
        if cmd.display_name.trim().is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }

        // The requested status is ignored on purpose: every account starts
        // pending approval.
        let mut roles = cmd.roles.clone();
        if roles.is_empty() {
            roles.insert(cmd.baseline_role);
        }

        Ok(vec![UserEvent::Registered(UserRegistered {
            user_id: cmd.user_id,
            username: cmd.username.trim().to_lowercase(),
            display_name: cmd.display_name.trim().to_string(),
            status: UserStatus::PendingApproval,
            roles,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_registered()?;
        if self.status == UserStatus::Active {
            return Err(DomainError::conflict("user already active"));
        }
        Ok(vec![UserEvent::Approved(UserApproved {
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_disable(&self, cmd: &DisableUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_registered()?;
        if self.status == UserStatus::Disabled {
            return Err(DomainError::conflict("user already disabled"));
        }
        Ok(vec![UserEvent::Disabled(UserDisabled {
            user_id: cmd.user_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_role(&self, cmd: &AssignRole) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_registered()?;
        self.ensure_not_disabled()?;
        if self.roles.contains(&cmd.role) {
            return Err(DomainError::conflict("role already assigned"));
        }
        Ok(vec![UserEvent::RoleAssigned(UserRoleAssigned {
            user_id: cmd.user_id,
            role: cmd.role,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revoke_role(&self, cmd: &RevokeRole) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_registered()?;
        if !self.roles.contains(&cmd.role) {
            return Err(DomainError::conflict("role not assigned"));
        }
        if self.roles.len() == 1 {
            return Err(DomainError::conflict("user must keep at least one role"));
        }
        Ok(vec![UserEvent::RoleRevoked(UserRoleRevoked {
            user_id: cmd.user_id,
            role: cmd.role,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_department(&self, cmd: &SetDepartment) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_registered()?;
        if self.department == cmd.department {
            return Ok(vec![]);
        }
        Ok(vec![UserEvent::DepartmentChanged(UserDepartmentChanged {
            user_id: cmd.user_id,
            department: cmd.department,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_login(&self, cmd: &RecordLogin) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_registered()?;
        match self.status {
            UserStatus::Active => Ok(vec![UserEvent::LoggedIn(UserLoggedIn {
                user_id: cmd.user_id,
                occurred_at: cmd.occurred_at,
            })]),
            UserStatus::PendingApproval => {
                Err(DomainError::forbidden("account is pending approval"))
            }
            UserStatus::Disabled => Err(DomainError::forbidden("account is disabled")),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

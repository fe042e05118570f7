//! Role & permission catalog aggregate.
//!
//! Roles and permissions are either **system** entities (installed at
//! bootstrap, immutable through the mutation commands) or **custom** entities
//! owned by the user who created them. The distinction is a tagged variant,
//! so immutability is enforced by one guard instead of a flag check scattered
//! across every operation.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use docflow_events::Event;

/// Role identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(Uuid);

/// Permission identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty) => {
        impl $t {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

impl_uuid_newtype!(RoleId);
impl_uuid_newtype!(PermissionId);

/// Who an RBAC entity belongs to.
///
/// System entities are seeded at bootstrap and cannot be renamed, regranted or
/// deleted through the mutation commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    System,
    Custom { owner: UserId },
}

impl Provenance {
    pub fn is_system(&self) -> bool {
        matches!(self, Provenance::System)
    }
}

/// A role and the permissions it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDef {
    pub id: RoleId,
    pub name: String,
    pub provenance: Provenance,
    pub permissions: BTreeSet<PermissionId>,
}

/// A named permission (e.g. "documents.classify").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDef {
    pub id: PermissionId,
    pub name: String,
    pub category: String,
    pub provenance: Provenance,
}

/// Aggregate root: the full role/permission catalog.
///
/// One aggregate holds the whole catalog so duplicate-name conflicts and
/// role→permission edges can be validated without cross-stream reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCatalog {
    id: AggregateId,
    roles: BTreeMap<RoleId, RoleDef>,
    permissions: BTreeMap<PermissionId, PermissionDef>,
    version: u64,
}

impl RoleCatalog {
    /// Create an empty catalog instance for rehydration.
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            roles: BTreeMap::new(),
            permissions: BTreeMap::new(),
            version: 0,
        }
    }

    pub fn role(&self, id: RoleId) -> Option<&RoleDef> {
        self.roles.get(&id)
    }

    pub fn permission(&self, id: PermissionId) -> Option<&PermissionDef> {
        self.permissions.get(&id)
    }

    pub fn role_by_name(&self, name: &str) -> Option<&RoleDef> {
        self.roles.values().find(|r| r.name == name)
    }

    pub fn permission_by_name(&self, name: &str) -> Option<&PermissionDef> {
        self.permissions.values().find(|p| p.name == name)
    }

    pub fn roles(&self) -> impl Iterator<Item = &RoleDef> {
        self.roles.values()
    }

    pub fn permissions(&self) -> impl Iterator<Item = &PermissionDef> {
        self.permissions.values()
    }

    /// Roles filtered by system/custom provenance.
    pub fn roles_by_provenance(&self, system: bool) -> Vec<&RoleDef> {
        self.roles
            .values()
            .filter(|r| r.provenance.is_system() == system)
            .collect()
    }

    /// Roles granting the permission with the given name.
    ///
    /// Linear scan over the role→permission edges; the catalog is small.
    pub fn roles_with_permission(&self, permission_name: &str) -> Vec<&RoleDef> {
        let Some(perm) = self.permission_by_name(permission_name) else {
            return Vec::new();
        };
        self.roles
            .values()
            .filter(|r| r.permissions.contains(&perm.id))
            .collect()
    }

    fn ensure_mutable_role(&self, id: RoleId) -> Result<&RoleDef, DomainError> {
        let role = self.roles.get(&id).ok_or(DomainError::NotFound)?;
        match role.provenance {
            Provenance::System => Err(DomainError::forbidden("system role is immutable")),
            Provenance::Custom { .. } => Ok(role),
        }
    }

    fn ensure_mutable_permission(&self, id: PermissionId) -> Result<&PermissionDef, DomainError> {
        let perm = self.permissions.get(&id).ok_or(DomainError::NotFound)?;
        match perm.provenance {
            Provenance::System => Err(DomainError::forbidden("system permission is immutable")),
            Provenance::Custom { .. } => Ok(perm),
        }
    }

    fn ensure_role_name_free(&self, name: &str) -> Result<(), DomainError> {
        if self.role_by_name(name).is_some() {
            return Err(DomainError::conflict(format!("role '{name}' already exists")));
        }
        Ok(())
    }

    fn ensure_permission_name_free(&self, name: &str) -> Result<(), DomainError> {
        if self.permission_by_name(name).is_some() {
            return Err(DomainError::conflict(format!(
                "permission '{name}' already exists"
            )));
        }
        Ok(())
    }
}

impl AggregateRoot for RoleCatalog {
    type Id = AggregateId;

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

/// Install a system permission (bootstrap only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallSystemPermission {
    pub permission_id: PermissionId,
    pub name: String,
    pub category: String,
    pub occurred_at: DateTime<Utc>,
}

/// Install a system role (bootstrap only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallSystemRole {
    pub role_id: RoleId,
    pub name: String,
    pub permissions: BTreeSet<PermissionId>,
    pub occurred_at: DateTime<Utc>,
}

/// Create a custom permission owned by `owner`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePermission {
    pub permission_id: PermissionId,
    pub name: String,
    pub category: String,
    pub owner: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamePermission {
    pub permission_id: PermissionId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePermission {
    pub permission_id: PermissionId,
    pub occurred_at: DateTime<Utc>,
}

/// Create a custom role owned by `owner`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRole {
    pub role_id: RoleId,
    pub name: String,
    pub owner: UserId,
    pub permissions: BTreeSet<PermissionId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRole {
    pub role_id: RoleId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Delete a role.
///
/// `assigned_users` is resolved by the caller from the users read model; the
/// catalog cannot see user↔role assignments itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRole {
    pub role_id: RoleId,
    pub assigned_users: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantPermission {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokePermission {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleCatalogCommand {
    InstallSystemPermission(InstallSystemPermission),
    InstallSystemRole(InstallSystemRole),
    CreatePermission(CreatePermission),
    RenamePermission(RenamePermission),
    DeletePermission(DeletePermission),
    CreateRole(CreateRole),
    RenameRole(RenameRole),
    DeleteRole(DeleteRole),
    GrantPermission(GrantPermission),
    RevokePermission(RevokePermission),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionInstalled {
    pub permission_id: PermissionId,
    pub name: String,
    pub category: String,
    pub provenance: Provenance,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRenamed {
    pub permission_id: PermissionId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDeleted {
    pub permission_id: PermissionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInstalled {
    pub role_id: RoleId,
    pub name: String,
    pub provenance: Provenance,
    pub permissions: BTreeSet<PermissionId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRenamed {
    pub role_id: RoleId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDeleted {
    pub role_id: RoleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGranted {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRevoked {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleCatalogEvent {
    PermissionInstalled(PermissionInstalled),
    PermissionRenamed(PermissionRenamed),
    PermissionDeleted(PermissionDeleted),
    RoleInstalled(RoleInstalled),
    RoleRenamed(RoleRenamed),
    RoleDeleted(RoleDeleted),
    PermissionGranted(PermissionGranted),
    PermissionRevoked(PermissionRevoked),
}

impl Event for RoleCatalogEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RoleCatalogEvent::PermissionInstalled(_) => "org.permission.installed",
            RoleCatalogEvent::PermissionRenamed(_) => "org.permission.renamed",
            RoleCatalogEvent::PermissionDeleted(_) => "org.permission.deleted",
            RoleCatalogEvent::RoleInstalled(_) => "org.role.installed",
            RoleCatalogEvent::RoleRenamed(_) => "org.role.renamed",
            RoleCatalogEvent::RoleDeleted(_) => "org.role.deleted",
            RoleCatalogEvent::PermissionGranted(_) => "org.role.permission_granted",
            RoleCatalogEvent::PermissionRevoked(_) => "org.role.permission_revoked",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RoleCatalogEvent::PermissionInstalled(e) => e.occurred_at,
            RoleCatalogEvent::PermissionRenamed(e) => e.occurred_at,
            RoleCatalogEvent::PermissionDeleted(e) => e.occurred_at,
            RoleCatalogEvent::RoleInstalled(e) => e.occurred_at,
            RoleCatalogEvent::RoleRenamed(e) => e.occurred_at,
            RoleCatalogEvent::RoleDeleted(e) => e.occurred_at,
            RoleCatalogEvent::PermissionGranted(e) => e.occurred_at,
            RoleCatalogEvent::PermissionRevoked(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for RoleCatalog {
    type Command = RoleCatalogCommand;
    type Event = RoleCatalogEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RoleCatalogEvent::PermissionInstalled(e) => {
                self.permissions.insert(
                    e.permission_id,
                    PermissionDef {
                        id: e.permission_id,
                        name: e.name.clone(),
                        category: e.category.clone(),
                        provenance: e.provenance,
                    },
                );
            }
            RoleCatalogEvent::PermissionRenamed(e) => {
                if let Some(perm) = self.permissions.get_mut(&e.permission_id) {
                    perm.name = e.name.clone();
                }
            }
            RoleCatalogEvent::PermissionDeleted(e) => {
                self.permissions.remove(&e.permission_id);
            }
            RoleCatalogEvent::RoleInstalled(e) => {
                self.roles.insert(
                    e.role_id,
                    RoleDef {
                        id: e.role_id,
                        name: e.name.clone(),
                        provenance: e.provenance,
                        permissions: e.permissions.clone(),
                    },
                );
            }
            RoleCatalogEvent::RoleRenamed(e) => {
                if let Some(role) = self.roles.get_mut(&e.role_id) {
                    role.name = e.name.clone();
                }
            }
            RoleCatalogEvent::RoleDeleted(e) => {
                self.roles.remove(&e.role_id);
            }
            RoleCatalogEvent::PermissionGranted(e) => {
                if let Some(role) = self.roles.get_mut(&e.role_id) {
                    role.permissions.insert(e.permission_id);
                }
            }
            RoleCatalogEvent::PermissionRevoked(e) => {
                if let Some(role) = self.roles.get_mut(&e.role_id) {
                    role.permissions.remove(&e.permission_id);
                }
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RoleCatalogCommand::InstallSystemPermission(cmd) => self.handle_install_permission(cmd),
            RoleCatalogCommand::InstallSystemRole(cmd) => self.handle_install_role(cmd),
            RoleCatalogCommand::CreatePermission(cmd) => self.handle_create_permission(cmd),
            RoleCatalogCommand::RenamePermission(cmd) => self.handle_rename_permission(cmd),
            RoleCatalogCommand::DeletePermission(cmd) => self.handle_delete_permission(cmd),
            RoleCatalogCommand::CreateRole(cmd) => self.handle_create_role(cmd),
            RoleCatalogCommand::RenameRole(cmd) => self.handle_rename_role(cmd),
            RoleCatalogCommand::DeleteRole(cmd) => self.handle_delete_role(cmd),
            RoleCatalogCommand::GrantPermission(cmd) => self.handle_grant(cmd),
            RoleCatalogCommand::RevokePermission(cmd) => self.handle_revoke(cmd),
        }
    }
}

impl RoleCatalog {
    fn handle_install_permission(
        &self,
        cmd: &InstallSystemPermission,
    ) -> Result<Vec<RoleCatalogEvent>, DomainError> {
        self.ensure_permission_name_free(&cmd.name)?;
        Ok(vec![RoleCatalogEvent::PermissionInstalled(
            PermissionInstalled {
                permission_id: cmd.permission_id,
                name: cmd.name.clone(),
                category: cmd.category.clone(),
                provenance: Provenance::System,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_install_role(
        &self,
        cmd: &InstallSystemRole,
    ) -> Result<Vec<RoleCatalogEvent>, DomainError> {
        self.ensure_role_name_free(&cmd.name)?;
        for perm in &cmd.permissions {
            if !self.permissions.contains_key(perm) {
                return Err(DomainError::NotFound);
            }
        }
        Ok(vec![RoleCatalogEvent::RoleInstalled(RoleInstalled {
            role_id: cmd.role_id,
            name: cmd.name.clone(),
            provenance: Provenance::System,
            permissions: cmd.permissions.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_create_permission(
        &self,
        cmd: &CreatePermission,
    ) -> Result<Vec<RoleCatalogEvent>, DomainError> {
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("permission name cannot be empty"));
        }
        self.ensure_permission_name_free(&cmd.name)?;
        Ok(vec![RoleCatalogEvent::PermissionInstalled(
            PermissionInstalled {
                permission_id: cmd.permission_id,
                name: cmd.name.clone(),
                category: cmd.category.clone(),
                provenance: Provenance::Custom { owner: cmd.owner },
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_rename_permission(
        &self,
        cmd: &RenamePermission,
    ) -> Result<Vec<RoleCatalogEvent>, DomainError> {
        self.ensure_mutable_permission(cmd.permission_id)?;
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("permission name cannot be empty"));
        }
        self.ensure_permission_name_free(&cmd.name)?;
        Ok(vec![RoleCatalogEvent::PermissionRenamed(PermissionRenamed {
            permission_id: cmd.permission_id,
            name: cmd.name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete_permission(
        &self,
        cmd: &DeletePermission,
    ) -> Result<Vec<RoleCatalogEvent>, DomainError> {
        self.ensure_mutable_permission(cmd.permission_id)?;
        if self
            .roles
            .values()
            .any(|r| r.permissions.contains(&cmd.permission_id))
        {
            return Err(DomainError::conflict(
                "permission is still granted to at least one role",
            ));
        }
        Ok(vec![RoleCatalogEvent::PermissionDeleted(PermissionDeleted {
            permission_id: cmd.permission_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_create_role(&self, cmd: &CreateRole) -> Result<Vec<RoleCatalogEvent>, DomainError> {
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("role name cannot be empty"));
        }
        self.ensure_role_name_free(&cmd.name)?;
        for perm in &cmd.permissions {
            if !self.permissions.contains_key(perm) {
                return Err(DomainError::NotFound);
            }
        }
        Ok(vec![RoleCatalogEvent::RoleInstalled(RoleInstalled {
            role_id: cmd.role_id,
            name: cmd.name.clone(),
            provenance: Provenance::Custom { owner: cmd.owner },
            permissions: cmd.permissions.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rename_role(&self, cmd: &RenameRole) -> Result<Vec<RoleCatalogEvent>, DomainError> {
        self.ensure_mutable_role(cmd.role_id)?;
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("role name cannot be empty"));
        }
        self.ensure_role_name_free(&cmd.name)?;
        Ok(vec![RoleCatalogEvent::RoleRenamed(RoleRenamed {
            role_id: cmd.role_id,
            name: cmd.name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete_role(&self, cmd: &DeleteRole) -> Result<Vec<RoleCatalogEvent>, DomainError> {
        self.ensure_mutable_role(cmd.role_id)?;
        if cmd.assigned_users > 0 {
            return Err(DomainError::conflict(format!(
                "role is still assigned to {} user(s)",
                cmd.assigned_users
            )));
        }
        Ok(vec![RoleCatalogEvent::RoleDeleted(RoleDeleted {
            role_id: cmd.role_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_grant(&self, cmd: &GrantPermission) -> Result<Vec<RoleCatalogEvent>, DomainError> {
        let role = self.ensure_mutable_role(cmd.role_id)?;
        if !self.permissions.contains_key(&cmd.permission_id) {
            return Err(DomainError::NotFound);
        }
        if role.permissions.contains(&cmd.permission_id) {
            return Err(DomainError::conflict("permission already granted"));
        }
        Ok(vec![RoleCatalogEvent::PermissionGranted(PermissionGranted {
            role_id: cmd.role_id,
            permission_id: cmd.permission_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revoke(&self, cmd: &RevokePermission) -> Result<Vec<RoleCatalogEvent>, DomainError> {
        let role = self.ensure_mutable_role(cmd.role_id)?;
        if !role.permissions.contains(&cmd.permission_id) {
            return Err(DomainError::conflict("permission not granted to this role"));
        }
        Ok(vec![RoleCatalogEvent::PermissionRevoked(PermissionRevoked {
            role_id: cmd.role_id,
            permission_id: cmd.permission_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

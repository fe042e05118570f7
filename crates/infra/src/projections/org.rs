//! Organization projections: department tree and role catalog read models.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use docflow_core::DepartmentId;
use docflow_events::EventEnvelope;
use docflow_org::department::{DepartmentCreated, DepartmentRenamed, DepartmentReparented};
use docflow_org::role::{
    PermissionDeleted, PermissionGranted, PermissionInstalled, PermissionRenamed,
    PermissionRevoked, RoleDeleted, RoleInstalled, RoleRenamed,
};
use docflow_org::{DirectoryEvent, PermissionId, Provenance, RoleCatalogEvent, RoleId};

use crate::read_model::KeyedStore;

// ─────────────────────────────────────────────────────────────────────────────
// Departments
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentReadModel {
    pub department_id: DepartmentId,
    pub name: String,
    pub parent: Option<DepartmentId>,
}

/// Projection that mirrors the department tree for queries.
pub struct DepartmentsProjection<S> {
    store: S,
}

impl<S> DepartmentsProjection<S>
where
    S: KeyedStore<DepartmentId, DepartmentReadModel>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn department(&self, id: DepartmentId) -> Option<DepartmentReadModel> {
        self.store.get(&id)
    }

    /// Top-level departments, name-ordered.
    pub fn roots(&self) -> Vec<DepartmentReadModel> {
        let mut roots: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|d| d.parent.is_none())
            .collect();
        roots.sort_by(|a, b| a.name.cmp(&b.name));
        roots
    }

    /// Direct children, name-ordered.
    pub fn children_of(&self, id: DepartmentId) -> Vec<DepartmentReadModel> {
        let mut children: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|d| d.parent == Some(id))
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        children
    }

    /// `id` plus every transitive child (oversight set input).
    ///
    /// BFS over the mirrored tree; the write side already guarantees
    /// acyclicity, the visited set is a guard against a torn read model.
    pub fn descendants_of(&self, id: DepartmentId) -> BTreeSet<DepartmentId> {
        let all = self.store.list();
        let mut result = BTreeSet::from([id]);
        let mut frontier = vec![id];
        while let Some(current) = frontier.pop() {
            for dept in &all {
                if dept.parent == Some(current) && result.insert(dept.department_id) {
                    frontier.push(dept.department_id);
                }
            }
        }
        result
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<serde_json::Value>,
    ) -> Result<(), anyhow::Error> {
        if !envelope.aggregate_type().starts_with("org.directory") {
            return Ok(());
        }

        let event: DirectoryEvent = serde_json::from_value(envelope.payload().clone())?;
        match event {
            DirectoryEvent::Created(e) => self.apply_created(e),
            DirectoryEvent::Renamed(e) => self.apply_renamed(e),
            DirectoryEvent::Reparented(e) => self.apply_reparented(e),
        }
        Ok(())
    }

    fn apply_created(&self, e: DepartmentCreated) {
        self.store.upsert(
            e.department_id,
            DepartmentReadModel {
                department_id: e.department_id,
                name: e.name,
                parent: e.parent,
            },
        );
    }

    fn apply_renamed(&self, e: DepartmentRenamed) {
        if let Some(mut model) = self.store.get(&e.department_id) {
            model.name = e.name;
            self.store.upsert(e.department_id, model);
        }
    }

    fn apply_reparented(&self, e: DepartmentReparented) {
        if let Some(mut model) = self.store.get(&e.department_id) {
            model.parent = e.new_parent;
            self.store.upsert(e.department_id, model);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles and permissions
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleReadModel {
    pub role_id: RoleId,
    pub name: String,
    pub provenance: Provenance,
    pub permissions: BTreeSet<PermissionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionReadModel {
    pub permission_id: PermissionId,
    pub name: String,
    pub category: String,
    pub provenance: Provenance,
}

/// Projection that mirrors the role/permission catalog for queries.
pub struct RolesProjection<R, P> {
    roles: R,
    permissions: P,
}

impl<R, P> RolesProjection<R, P>
where
    R: KeyedStore<RoleId, RoleReadModel>,
    P: KeyedStore<PermissionId, PermissionReadModel>,
{
    pub fn new(roles: R, permissions: P) -> Self {
        Self { roles, permissions }
    }

    pub fn role(&self, id: RoleId) -> Option<RoleReadModel> {
        self.roles.get(&id)
    }

    pub fn role_by_name(&self, name: &str) -> Option<RoleReadModel> {
        self.roles.list().into_iter().find(|r| r.name == name)
    }

    pub fn all_roles(&self) -> Vec<RoleReadModel> {
        let mut roles = self.roles.list();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        roles
    }

    pub fn permission(&self, id: PermissionId) -> Option<PermissionReadModel> {
        self.permissions.get(&id)
    }

    pub fn all_permissions(&self) -> Vec<PermissionReadModel> {
        let mut perms = self.permissions.list();
        perms.sort_by(|a, b| (a.category.as_str(), a.name.as_str()).cmp(&(b.category.as_str(), b.name.as_str())));
        perms
    }

    /// Role names for a set of role ids (claims issuance input). Unknown ids
    /// fall back to their uuid form rather than dropping silently.
    pub fn role_names(&self, ids: &[RoleId]) -> Vec<String> {
        ids.iter()
            .map(|id| {
                self.roles
                    .get(id)
                    .map(|r| r.name)
                    .unwrap_or_else(|| id.as_uuid().to_string())
            })
            .collect()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<serde_json::Value>,
    ) -> Result<(), anyhow::Error> {
        if !envelope.aggregate_type().starts_with("org.catalog") {
            return Ok(());
        }

        let event: RoleCatalogEvent = serde_json::from_value(envelope.payload().clone())?;
        match event {
            RoleCatalogEvent::PermissionInstalled(e) => self.apply_permission_installed(e),
            RoleCatalogEvent::PermissionRenamed(e) => self.apply_permission_renamed(e),
            RoleCatalogEvent::PermissionDeleted(e) => self.apply_permission_deleted(e),
            RoleCatalogEvent::RoleInstalled(e) => self.apply_role_installed(e),
            RoleCatalogEvent::RoleRenamed(e) => self.apply_role_renamed(e),
            RoleCatalogEvent::RoleDeleted(e) => self.apply_role_deleted(e),
            RoleCatalogEvent::PermissionGranted(e) => self.apply_granted(e),
            RoleCatalogEvent::PermissionRevoked(e) => self.apply_revoked(e),
        }
        Ok(())
    }

    fn apply_permission_installed(&self, e: PermissionInstalled) {
        self.permissions.upsert(
            e.permission_id,
            PermissionReadModel {
                permission_id: e.permission_id,
                name: e.name,
                category: e.category,
                provenance: e.provenance,
            },
        );
    }

    fn apply_permission_renamed(&self, e: PermissionRenamed) {
        if let Some(mut model) = self.permissions.get(&e.permission_id) {
            model.name = e.name;
            self.permissions.upsert(e.permission_id, model);
        }
    }

    fn apply_permission_deleted(&self, e: PermissionDeleted) {
        self.permissions.remove(&e.permission_id);
    }

    fn apply_role_installed(&self, e: RoleInstalled) {
        self.roles.upsert(
            e.role_id,
            RoleReadModel {
                role_id: e.role_id,
                name: e.name,
                provenance: e.provenance,
                permissions: e.permissions,
            },
        );
    }

    fn apply_role_renamed(&self, e: RoleRenamed) {
        if let Some(mut model) = self.roles.get(&e.role_id) {
            model.name = e.name;
            self.roles.upsert(e.role_id, model);
        }
    }

    fn apply_role_deleted(&self, e: RoleDeleted) {
        self.roles.remove(&e.role_id);
    }

    fn apply_granted(&self, e: PermissionGranted) {
        if let Some(mut model) = self.roles.get(&e.role_id) {
            model.permissions.insert(e.permission_id);
            self.roles.upsert(e.role_id, model);
        }
    }

    fn apply_revoked(&self, e: PermissionRevoked) {
        if let Some(mut model) = self.roles.get(&e.role_id) {
            model.permissions.remove(&e.permission_id);
            self.roles.upsert(e.role_id, model);
        }
    }
}

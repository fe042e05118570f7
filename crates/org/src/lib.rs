//! `docflow-org` — organizational structure: department tree and RBAC catalog.
//!
//! Both models are pure aggregates; persistence and HTTP live elsewhere.

pub mod department;
pub mod role;

pub use department::{
    CreateDepartment, DepartmentCreated, DepartmentNode, DepartmentRenamed, DepartmentReparented,
    Directory, DirectoryCommand, DirectoryEvent, RenameDepartment, ReparentDepartment,
};
pub use role::{
    CreateRole, GrantPermission, PermissionDef, PermissionId, Provenance, RevokePermission,
    RoleCatalog, RoleCatalogCommand, RoleCatalogEvent, RoleDef, RoleId,
};

//! Event-driven read model maintenance.
//!
//! Each projection consumes published `EventEnvelope`s, filters on the
//! aggregate type it cares about, and upserts into a keyed store. Projections
//! are idempotent: replaying an envelope converges to the same read model.

pub mod documents;
pub mod org;
pub mod users;

pub use documents::{DocumentReadModel, DocumentsProjection};
pub use org::{
    DepartmentReadModel, DepartmentsProjection, PermissionReadModel, RoleReadModel,
    RolesProjection,
};
pub use users::{UserReadModel, UsersProjection};

//! Infrastructure wiring: store, bus, projections, dispatcher, bootstrap.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;

use docflow_core::{AggregateId, DepartmentId, UserId};
use docflow_documents::DocumentId;
use docflow_events::EventEnvelope;
use docflow_identity::user::{ApproveUser, RegisterUser};
use docflow_identity::{TokenConfig, User, UserCommand};
use docflow_infra::access::{AccessController, USER_AGGREGATE, user_stream};
use docflow_infra::classification::ClassificationService;
use docflow_infra::command_dispatcher::{CommandDispatcher, DispatchError};
use docflow_infra::event_fanout::SyncProjectionBus;
use docflow_infra::event_store::{InMemoryEventStore, StoredEvent};
use docflow_infra::notifications::NotificationsFanout;
use docflow_infra::projections::{
    DepartmentReadModel, DepartmentsProjection, DocumentReadModel, DocumentsProjection,
    PermissionReadModel, RoleReadModel, RolesProjection, UserReadModel, UsersProjection,
};
use docflow_infra::read_model::InMemoryKeyedStore;
use docflow_infra::tokens::HsTokenIssuer;
use docflow_infra::workflow::{DocumentTypeRegistry, WorkflowService};
use docflow_notify::{InMemoryNotificationStore, NotificationService};
use docflow_org::department::{Directory, DirectoryCommand};
use docflow_org::role::{InstallSystemPermission, InstallSystemRole, RoleCatalog, RoleCatalogCommand};
use docflow_org::{PermissionId, RoleId};

/// Stream type identifier for the department directory aggregate.
pub const DIRECTORY_AGGREGATE: &str = "org.directory";
/// Stream type identifier for the role catalog aggregate.
pub const CATALOG_AGGREGATE: &str = "org.catalog";

pub type Store = Arc<InMemoryEventStore>;
pub type Bus = Arc<SyncProjectionBus>;
pub type Dispatcher = CommandDispatcher<Store, Bus>;

type UserStore = Arc<InMemoryKeyedStore<UserId, UserReadModel>>;
type DeptStore = Arc<InMemoryKeyedStore<DepartmentId, DepartmentReadModel>>;
type RoleStore = Arc<InMemoryKeyedStore<RoleId, RoleReadModel>>;
type PermStore = Arc<InMemoryKeyedStore<PermissionId, PermissionReadModel>>;
type DocStore = Arc<InMemoryKeyedStore<DocumentId, DocumentReadModel>>;

/// All wiring a request handler needs, built once at startup.
///
/// Projections are synchronous subscribers on the bus, so every read that
/// follows a successful dispatch observes the dispatched events.
pub struct AppServices {
    dispatcher: Dispatcher,
    user_store: UserStore,
    dept_store: DeptStore,
    role_store: RoleStore,
    perm_store: PermStore,
    doc_store: DocStore,
    notif_store: Arc<InMemoryNotificationStore>,
    registry: DocumentTypeRegistry,
    issuer: Arc<HsTokenIssuer>,
    directory_stream: AggregateId,
    catalog_stream: AggregateId,
    baseline_role: RoleId,
}

impl AppServices {
    pub fn users(&self) -> UsersProjection<UserStore> {
        UsersProjection::new(self.user_store.clone())
    }

    pub fn departments(&self) -> DepartmentsProjection<DeptStore> {
        DepartmentsProjection::new(self.dept_store.clone())
    }

    pub fn roles(&self) -> RolesProjection<RoleStore, PermStore> {
        RolesProjection::new(self.role_store.clone(), self.perm_store.clone())
    }

    pub fn documents(&self) -> DocumentsProjection<DocStore> {
        DocumentsProjection::new(self.doc_store.clone())
    }

    pub fn classification(&self) -> ClassificationService<UserStore, DocStore, DeptStore> {
        ClassificationService::new(self.users(), self.documents(), self.departments())
    }

    pub fn workflow(&self) -> WorkflowService<'_, Store, Bus, DocStore> {
        WorkflowService::new(&self.dispatcher, self.documents(), &self.registry)
    }

    pub fn access(&self) -> AccessController<'_, Store, Bus, UserStore, RoleStore, PermStore> {
        AccessController::new(&self.dispatcher, self.users(), self.roles(), self.issuer.clone())
    }

    pub fn notifications(&self) -> NotificationService<Arc<InMemoryNotificationStore>> {
        NotificationService::new(self.notif_store.clone())
    }

    pub fn registry(&self) -> &DocumentTypeRegistry {
        &self.registry
    }

    pub fn baseline_role(&self) -> RoleId {
        self.baseline_role
    }

    pub fn dispatch_directory(
        &self,
        command: DirectoryCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher.dispatch::<Directory>(
            self.directory_stream,
            DIRECTORY_AGGREGATE,
            command,
            Directory::empty,
        )
    }

    pub fn dispatch_catalog(
        &self,
        command: RoleCatalogCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher.dispatch::<RoleCatalog>(
            self.catalog_stream,
            CATALOG_AGGREGATE,
            command,
            RoleCatalog::empty,
        )
    }

    pub fn dispatch_user(
        &self,
        user_id: UserId,
        command: UserCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher.dispatch::<User>(
            user_stream(user_id),
            USER_AGGREGATE,
            command,
            |_| User::empty(user_id),
        )
    }
}

pub fn build_services(jwt_secret: &[u8]) -> AppServices {
    let store: Store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(SyncProjectionBus::new());

    let user_store: UserStore = Arc::new(InMemoryKeyedStore::new());
    let dept_store: DeptStore = Arc::new(InMemoryKeyedStore::new());
    let role_store: RoleStore = Arc::new(InMemoryKeyedStore::new());
    let perm_store: PermStore = Arc::new(InMemoryKeyedStore::new());
    let doc_store: DocStore = Arc::new(InMemoryKeyedStore::new());
    let notif_store = Arc::new(InMemoryNotificationStore::new());

    // Projections subscribe before the fan-out so notification recipients are
    // resolved against up-to-date read models.
    {
        let p = Arc::new(UsersProjection::new(user_store.clone()));
        bus.register(Arc::new(move |env: &EventEnvelope<JsonValue>| {
            p.apply_envelope(env)
        }));
    }
    {
        let p = Arc::new(DepartmentsProjection::new(dept_store.clone()));
        bus.register(Arc::new(move |env: &EventEnvelope<JsonValue>| {
            p.apply_envelope(env)
        }));
    }
    {
        let p = Arc::new(RolesProjection::new(role_store.clone(), perm_store.clone()));
        bus.register(Arc::new(move |env: &EventEnvelope<JsonValue>| {
            p.apply_envelope(env)
        }));
    }
    {
        let p = Arc::new(DocumentsProjection::new(doc_store.clone()));
        bus.register(Arc::new(move |env: &EventEnvelope<JsonValue>| {
            p.apply_envelope(env)
        }));
    }
    {
        let fanout = Arc::new(NotificationsFanout::new(
            NotificationService::new(notif_store.clone()),
            UsersProjection::new(user_store.clone()),
            DocumentsProjection::new(doc_store.clone()),
        ));
        bus.register(Arc::new(move |env: &EventEnvelope<JsonValue>| {
            fanout.apply_envelope(env)
        }));
    }

    let dispatcher = CommandDispatcher::new(store, bus);

    let registry = DocumentTypeRegistry::new();
    for name in ["Official letter", "Memo", "Report"] {
        registry.register(name);
    }

    let services = AppServices {
        dispatcher,
        user_store,
        dept_store,
        role_store,
        perm_store,
        doc_store,
        notif_store,
        registry,
        issuer: Arc::new(HsTokenIssuer::new(jwt_secret, TokenConfig::default())),
        directory_stream: AggregateId::new(),
        catalog_stream: AggregateId::new(),
        baseline_role: RoleId::new(),
    };

    seed_catalog(&services);
    seed_admin(&services);

    services
}

/// Install the system roles and permissions every deployment starts with.
fn seed_catalog(services: &AppServices) {
    let now = Utc::now();
    let mut admin_permissions = BTreeSet::new();

    for (name, category) in [
        ("org.manage", "organization"),
        ("users.manage", "identity"),
        ("documents.manage", "documents"),
    ] {
        let permission_id = PermissionId::new();
        admin_permissions.insert(permission_id);
        services
            .dispatch_catalog(RoleCatalogCommand::InstallSystemPermission(
                InstallSystemPermission {
                    permission_id,
                    name: name.to_string(),
                    category: category.to_string(),
                    occurred_at: now,
                },
            ))
            .expect("system permission install failed at bootstrap");
    }

    services
        .dispatch_catalog(RoleCatalogCommand::InstallSystemRole(InstallSystemRole {
            role_id: services.baseline_role,
            name: "user".to_string(),
            permissions: BTreeSet::new(),
            occurred_at: now,
        }))
        .expect("system role install failed at bootstrap");

    services
        .dispatch_catalog(RoleCatalogCommand::InstallSystemRole(InstallSystemRole {
            role_id: RoleId::new(),
            name: "admin".to_string(),
            permissions: admin_permissions,
            occurred_at: now,
        }))
        .expect("system role install failed at bootstrap");
}

/// Seed a first approved administrator so the API is usable from a cold start.
fn seed_admin(services: &AppServices) {
    let admin_role = services
        .roles()
        .role_by_name("admin")
        .map(|r| r.role_id)
        .expect("admin role missing after bootstrap");

    let user_id = UserId::new();
    let mut roles = BTreeSet::new();
    roles.insert(admin_role);

    services
        .dispatch_user(
            user_id,
            UserCommand::Register(RegisterUser {
                user_id,
                username: "admin".to_string(),
                display_name: "Administrator".to_string(),
                requested_status: None,
                roles,
                baseline_role: services.baseline_role,
                occurred_at: Utc::now(),
            }),
        )
        .expect("admin registration failed at bootstrap");

    services
        .dispatch_user(
            user_id,
            UserCommand::Approve(ApproveUser {
                user_id,
                occurred_at: Utc::now(),
            }),
        )
        .expect("admin approval failed at bootstrap");

    tracing::info!(username = "admin", "seeded bootstrap administrator");
}

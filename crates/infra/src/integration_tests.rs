//! End-to-end pipeline tests: dispatcher → store → bus → projections →
//! services, all in-memory.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;

use docflow_core::{AggregateId, DepartmentId, ExpectedVersion, UserId};
use docflow_documents::{
    ActionState, Classification, DistributionType, DocumentId, SecurityLevel, WorkflowStage,
};
use docflow_events::{EventBus, EventEnvelope};
use docflow_identity::user::{ApproveUser, RegisterUser, SetDepartment};
use docflow_identity::{TokenConfig, User, UserCommand};
use docflow_notify::{
    InMemoryNotificationStore, NotificationService, NotificationType, Page,
};
use docflow_org::department::{CreateDepartment, Directory, DirectoryCommand};
use docflow_org::role::{InstallSystemRole, RoleCatalog, RoleCatalogCommand};
use docflow_org::{PermissionId, RoleId};

use crate::access::{AccessController, USER_AGGREGATE, user_stream};
use crate::classification::ClassificationService;
use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_fanout::SyncProjectionBus;
use crate::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use crate::notifications::NotificationsFanout;
use crate::projections::{
    DepartmentReadModel, DepartmentsProjection, DocumentReadModel, DocumentsProjection,
    PermissionReadModel, RoleReadModel, RolesProjection, UserReadModel, UsersProjection,
};
use crate::read_model::InMemoryKeyedStore;
use crate::tokens::HsTokenIssuer;
use crate::workflow::{DocumentTypeRegistry, WorkflowService};

const DIRECTORY_AGGREGATE: &str = "org.directory";
const CATALOG_AGGREGATE: &str = "org.catalog";

type UserStore = Arc<InMemoryKeyedStore<UserId, UserReadModel>>;
type DeptStore = Arc<InMemoryKeyedStore<DepartmentId, DepartmentReadModel>>;
type RoleStore = Arc<InMemoryKeyedStore<RoleId, RoleReadModel>>;
type PermStore = Arc<InMemoryKeyedStore<PermissionId, PermissionReadModel>>;
type DocStore = Arc<InMemoryKeyedStore<DocumentId, DocumentReadModel>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<SyncProjectionBus>>;

struct TestApp {
    store: Arc<InMemoryEventStore>,
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

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(InMemoryEventStore::new());
        let bus = Arc::new(SyncProjectionBus::new());

        let user_store: UserStore = Arc::new(InMemoryKeyedStore::new());
        let dept_store: DeptStore = Arc::new(InMemoryKeyedStore::new());
        let role_store: RoleStore = Arc::new(InMemoryKeyedStore::new());
        let perm_store: PermStore = Arc::new(InMemoryKeyedStore::new());
        let doc_store: DocStore = Arc::new(InMemoryKeyedStore::new());
        let notif_store = Arc::new(InMemoryNotificationStore::new());

        // Projections first, fan-out last, so recipient lookups see current
        // read models.
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

        let dispatcher = CommandDispatcher::new(store.clone(), bus);

        let app = Self {
            store,
            dispatcher,
            user_store,
            dept_store,
            role_store,
            perm_store,
            doc_store,
            notif_store,
            registry: DocumentTypeRegistry::new(),
            issuer: Arc::new(HsTokenIssuer::new(b"integration-secret", TokenConfig::default())),
            directory_stream: AggregateId::new(),
            catalog_stream: AggregateId::new(),
            baseline_role: RoleId::new(),
        };

        // Seed the baseline system role every registration falls back to.
        app.dispatcher
            .dispatch::<RoleCatalog>(
                app.catalog_stream,
                CATALOG_AGGREGATE,
                RoleCatalogCommand::InstallSystemRole(InstallSystemRole {
                    role_id: app.baseline_role,
                    name: "user".to_string(),
                    permissions: BTreeSet::new(),
                    occurred_at: Utc::now(),
                }),
                RoleCatalog::empty,
            )
            .expect("baseline role install should succeed");

        app
    }

    fn users(&self) -> UsersProjection<UserStore> {
        UsersProjection::new(self.user_store.clone())
    }

    fn roles(&self) -> RolesProjection<RoleStore, PermStore> {
        RolesProjection::new(self.role_store.clone(), self.perm_store.clone())
    }

    fn classification(&self) -> ClassificationService<UserStore, DocStore, DeptStore> {
        ClassificationService::new(
            self.users(),
            DocumentsProjection::new(self.doc_store.clone()),
            DepartmentsProjection::new(self.dept_store.clone()),
        )
    }

    fn workflow(&self) -> WorkflowService<'_, Arc<InMemoryEventStore>, Arc<SyncProjectionBus>, DocStore> {
        WorkflowService::new(
            &self.dispatcher,
            DocumentsProjection::new(self.doc_store.clone()),
            &self.registry,
        )
    }

    fn access(
        &self,
    ) -> AccessController<'_, Arc<InMemoryEventStore>, Arc<SyncProjectionBus>, UserStore, RoleStore, PermStore>
    {
        AccessController::new(
            &self.dispatcher,
            self.users(),
            self.roles(),
            self.issuer.clone(),
        )
    }

    fn inbox(&self) -> NotificationService<Arc<InMemoryNotificationStore>> {
        NotificationService::new(self.notif_store.clone())
    }

    fn create_department(&self, name: &str, parent: Option<DepartmentId>) -> DepartmentId {
        let id = DepartmentId::new();
        self.dispatcher
            .dispatch::<Directory>(
                self.directory_stream,
                DIRECTORY_AGGREGATE,
                DirectoryCommand::Create(CreateDepartment {
                    department_id: id,
                    name: name.to_string(),
                    parent,
                    occurred_at: Utc::now(),
                }),
                Directory::empty,
            )
            .expect("department creation should succeed");
        id
    }

    fn register_user(
        &self,
        username: &str,
        department: Option<DepartmentId>,
        approve: bool,
    ) -> UserId {
        let user_id = UserId::new();
        self.dispatcher
            .dispatch::<User>(
                user_stream(user_id),
                USER_AGGREGATE,
                UserCommand::Register(RegisterUser {
                    user_id,
                    username: username.to_string(),
                    display_name: username.to_string(),
                    requested_status: None,
                    roles: BTreeSet::new(),
                    baseline_role: self.baseline_role,
                    occurred_at: Utc::now(),
                }),
                |_| User::empty(user_id),
            )
            .expect("registration should succeed");

        if approve {
            self.dispatcher
                .dispatch::<User>(
                    user_stream(user_id),
                    USER_AGGREGATE,
                    UserCommand::Approve(ApproveUser {
                        user_id,
                        occurred_at: Utc::now(),
                    }),
                    |_| User::empty(user_id),
                )
                .expect("approval should succeed");
        }

        if department.is_some() {
            self.dispatcher
                .dispatch::<User>(
                    user_stream(user_id),
                    USER_AGGREGATE,
                    UserCommand::SetDepartment(SetDepartment {
                        user_id,
                        department,
                        occurred_at: Utc::now(),
                    }),
                    |_| User::empty(user_id),
                )
                .expect("department assignment should succeed");
        }

        user_id
    }
}

#[test]
fn department_review_flow_end_to_end() {
    let app = TestApp::new();

    let parent = app.create_department("Administration", None);
    let child = app.create_department("Records", Some(parent));

    let author = app.register_user("author", None, true);
    let reviewer = app.register_user("reviewer", Some(child), true);
    let supervisor = app.register_user("supervisor", Some(parent), true);

    let workflow = app.workflow();
    let doc = workflow
        .create_document(
            "Incoming correspondence".to_string(),
            author,
            SecurityLevel::Normal,
            DistributionType::Incoming,
            None,
        )
        .unwrap();
    workflow
        .assign_document(doc.document_id, Some(child), None)
        .unwrap();

    let classification = app.classification();
    let author_scope = classification.scope_for(author).unwrap();
    workflow
        .advance_stage(doc.document_id, author_scope)
        .unwrap();

    // Routed to the child department: member and overseeing supervisor both
    // see Pending, the author is done.
    assert_eq!(
        classification
            .classify_for(doc.document_id, reviewer)
            .unwrap(),
        Classification::Pending
    );
    assert_eq!(
        classification
            .classify_for(doc.document_id, supervisor)
            .unwrap(),
        Classification::Pending
    );
    assert_eq!(
        classification.classify_for(doc.document_id, author).unwrap(),
        Classification::Processed
    );

    let reviewer_scope = classification.scope_for(reviewer).unwrap();
    workflow
        .record_action(
            doc.document_id,
            reviewer_scope,
            ActionState::Completed,
            Some("reviewed and filed".to_string()),
        )
        .unwrap();

    assert_eq!(
        classification
            .classify_for(doc.document_id, reviewer)
            .unwrap(),
        Classification::Processed
    );
    // Oversight follows the department's collective state.
    assert_eq!(
        classification
            .classify_for(doc.document_id, supervisor)
            .unwrap(),
        Classification::Processed
    );

    let summary = classification.summary_for(reviewer).unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.pending + summary.processing, 0);

    // Read model reflects the advancement.
    let current = workflow.document(doc.document_id).unwrap();
    assert_eq!(current.stage, WorkflowStage::Submitted);
    assert_eq!(current.actions.len(), 1);
}

#[test]
fn assignment_fans_out_notifications_to_department_members() {
    let app = TestApp::new();
    let dept = app.create_department("Archives", None);
    let author = app.register_user("author", None, true);
    let member = app.register_user("member", Some(dept), true);

    let workflow = app.workflow();
    let doc = workflow
        .create_document(
            "Retention schedule".to_string(),
            author,
            SecurityLevel::Normal,
            DistributionType::Internal,
            None,
        )
        .unwrap();
    workflow
        .assign_document(doc.document_id, Some(dept), None)
        .unwrap();

    let inbox = app.inbox();
    let rows = inbox.list_for_user(member, Page::default()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, NotificationType::DocumentAssigned);
    assert_eq!(inbox.unread_count(member).unwrap(), 1);

    // The author assigned nothing to themselves.
    assert_eq!(inbox.unread_count(author).unwrap(), 0);
}

#[test]
fn approval_notifies_the_account_owner() {
    let app = TestApp::new();
    let user = app.register_user("newcomer", None, true);

    let rows = app.inbox().list_for_user(user, Page::default()).unwrap();
    assert!(
        rows.iter()
            .any(|n| n.kind == NotificationType::AccountApproved)
    );
}

#[test]
fn login_issues_tokens_and_rotation_blocks_reuse() {
    let app = TestApp::new();
    app.register_user("an.nguyen", None, true);

    let access = app.access();
    let (resolved, pair) = access.login("an.nguyen", false).unwrap();
    assert_eq!(resolved.username, "an.nguyen");

    // The bearer token resolves back to the same account.
    let current = access.current_user(Some(&pair.access_token)).unwrap();
    assert_eq!(current.user_id, resolved.user_id);

    // Rotation: the exchanged refresh token is spent.
    let next = access.refresh(&pair.refresh_token).unwrap();
    assert_ne!(next.refresh_token, pair.refresh_token);
    let err = access.refresh(&pair.refresh_token).unwrap_err();
    assert!(matches!(err, DispatchError::Unauthenticated(_)));

    // Login left an audit trail on the user aggregate.
    let user: User = app
        .dispatcher
        .load(user_stream(resolved.user_id), |_| {
            User::empty(resolved.user_id)
        })
        .unwrap();
    assert!(user.last_login.is_some());
}

#[test]
fn pending_accounts_cannot_login() {
    let app = TestApp::new();
    app.register_user("pending.user", None, false);

    let err = app.access().login("pending.user", false).unwrap_err();
    assert!(matches!(err, DispatchError::Forbidden(_)));
}

#[test]
fn missing_bearer_is_unauthenticated() {
    let app = TestApp::new();
    let err = app.access().current_user(None).unwrap_err();
    assert!(matches!(
        err,
        docflow_core::DomainError::Unauthenticated(_)
    ));
}

#[test]
fn losing_writer_gets_a_conflict() {
    let app = TestApp::new();
    let id = AggregateId::new();

    let event = |title: &str| {
        UncommittedEvent::from_typed(
            id,
            "documents.document",
            uuid::Uuid::now_v7(),
            &docflow_documents::DocumentEvent::DocumentCreated {
                document_id: DocumentId::from(id),
                title: title.to_string(),
                author: UserId::new(),
                security_level: SecurityLevel::Normal,
                distribution: DistributionType::Internal,
                due_at: None,
                occurred_at: Utc::now(),
            },
        )
        .unwrap()
    };

    // Two writers loaded the same (empty) stream version.
    app.store
        .append(vec![event("first")], ExpectedVersion::Exact(0))
        .unwrap();
    let err = app
        .store
        .append(vec![event("second")], ExpectedVersion::Exact(0))
        .unwrap_err();
    let mapped = DispatchError::from(err);
    assert!(matches!(mapped, DispatchError::Conflict(_)));
}

#[test]
fn registered_type_is_required_for_type_changes() {
    let app = TestApp::new();
    let author = app.register_user("author", None, true);

    let workflow = app.workflow();
    let doc = workflow
        .create_document(
            "Unfiled memo".to_string(),
            author,
            SecurityLevel::Normal,
            DistributionType::Internal,
            None,
        )
        .unwrap();

    let scope = app.classification().scope_for(author).unwrap();

    let unknown = docflow_documents::DocumentTypeId::new();
    let err = workflow
        .set_document_type(doc.document_id, unknown, scope.clone(), None)
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotFound));

    let official = app.registry.register("Official letter");
    let updated = workflow
        .set_document_type(doc.document_id, official, scope, None)
        .unwrap();
    assert_eq!(updated.document_type, Some(official));
    assert_eq!(updated.history.len(), 1);
    assert_eq!(
        workflow.document_type(doc.document_id).unwrap().name,
        "Official letter"
    );
}

#[test]
fn summary_matches_per_document_classification() {
    let app = TestApp::new();
    let dept = app.create_department("Operations", None);
    let other = app.create_department("Finance", None);
    let member = app.register_user("member", Some(dept), true);
    let outsider_author = app.register_user("outsider", None, true);

    let workflow = app.workflow();
    for (target, n) in [(dept, 3u64), (other, 2u64)] {
        for i in 0..n {
            let doc = workflow
                .create_document(
                    format!("doc {target} {i}"),
                    outsider_author,
                    SecurityLevel::Normal,
                    DistributionType::Internal,
                    None,
                )
                .unwrap();
            workflow
                .assign_document(doc.document_id, Some(target), None)
                .unwrap();
            let author_scope = app.classification().scope_for(outsider_author).unwrap();
            workflow
                .advance_stage(doc.document_id, author_scope)
                .unwrap();
        }
    }

    let classification = app.classification();
    let summary = classification.summary_for(member).unwrap();
    // Only the three documents routed to the member's department apply.
    assert_eq!(summary.pending, 3);
    assert_eq!(summary.total(), 3);

    let inbox = classification.inbox_for(member).unwrap();
    assert_eq!(inbox.len(), 3);
    assert!(
        inbox
            .iter()
            .all(|(_, status)| *status == Classification::Pending)
    );
}

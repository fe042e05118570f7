//! Document aggregate: workflow stages, routing, actions, and type history.
//!
//! A document moves forward through a fixed stage order and never backwards.
//! Every mutation command is gated by the caller's classification: a user the
//! document is not routed to cannot touch it, and a user who has already
//! finished their part cannot keep mutating it.
//!
//! # Invariants
//! - Stages only advance (`Draft .. Archived`), one step at a time.
//! - `Archived` is terminal: no assignment, no actions, no type changes.
//! - Type changes append to `history`; prior entries are never rewritten.
//! - Action records are append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docflow_core::{
    Aggregate, AggregateId, AggregateRoot, DepartmentId, DomainError, DomainResult, UserId,
};
use docflow_events::Event;

use crate::classify::{ActorScope, Classification, classify};

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DocumentId(pub AggregateId);

impl DocumentId {
    pub fn new() -> Self {
        Self(AggregateId::new())
    }

    pub fn as_aggregate_id(&self) -> AggregateId {
        self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<AggregateId> for DocumentId {
    fn from(value: AggregateId) -> Self {
        Self(value)
    }
}

/// Identifier for an entry in the document type registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DocumentTypeId(Uuid);

impl DocumentTypeId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DocumentTypeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for DocumentTypeId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| DomainError::validation(format!("invalid document type id: {s}")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    Normal,
    Confidential,
    Secret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionType {
    Incoming,
    Outgoing,
    Internal,
}

/// Workflow stages in forward order. `Ord` follows declaration order, so
/// `from < to` holds for every legal advancement.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Draft,
    Submitted,
    DepartmentReview,
    Approval,
    Dispatched,
    Archived,
}

/// Who owes the next action at a given stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageActor {
    Author,
    AssignedDepartment,
    AssignedHandler,
    Nobody,
}

impl WorkflowStage {
    pub fn awaits(&self) -> StageActor {
        match self {
            WorkflowStage::Draft => StageActor::Author,
            WorkflowStage::Submitted | WorkflowStage::DepartmentReview => {
                StageActor::AssignedDepartment
            }
            WorkflowStage::Approval => StageActor::AssignedHandler,
            WorkflowStage::Dispatched | WorkflowStage::Archived => StageActor::Nobody,
        }
    }

    pub fn next(&self) -> Option<WorkflowStage> {
        match self {
            WorkflowStage::Draft => Some(WorkflowStage::Submitted),
            WorkflowStage::Submitted => Some(WorkflowStage::DepartmentReview),
            WorkflowStage::DepartmentReview => Some(WorkflowStage::Approval),
            WorkflowStage::Approval => Some(WorkflowStage::Dispatched),
            WorkflowStage::Dispatched => Some(WorkflowStage::Archived),
            WorkflowStage::Archived => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStage::Archived)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Started,
    Completed,
}

/// One actor's recorded progress at one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub actor: UserId,
    /// Department the actor acted on behalf of, when routing was
    /// department-based.
    pub department: Option<DepartmentId>,
    pub stage: WorkflowStage,
    pub state: ActionState,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// One entry in the document's type change history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeChangeEntry {
    pub document_type: DocumentTypeId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
    pub comment: Option<String>,
}

/// Borrowed view of the fields classification needs.
#[derive(Debug, Clone, Copy)]
pub struct DocumentFacts<'a> {
    pub stage: WorkflowStage,
    pub author: UserId,
    pub assigned_department: Option<DepartmentId>,
    pub assigned_handler: Option<UserId>,
    pub actions: &'a [ActionRecord],
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DocumentCommand {
    CreateDocument {
        title: String,
        author: UserId,
        security_level: SecurityLevel,
        distribution: DistributionType,
        due_at: Option<DateTime<Utc>>,
        occurred_at: DateTime<Utc>,
    },
    AssignDocument {
        department: Option<DepartmentId>,
        handler: Option<UserId>,
        occurred_at: DateTime<Utc>,
    },
    RecordAction {
        actor_scope: ActorScope,
        state: ActionState,
        comment: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    SetDocumentType {
        document_type: DocumentTypeId,
        actor_scope: ActorScope,
        comment: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    AdvanceStage {
        actor_scope: ActorScope,
        occurred_at: DateTime<Utc>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentEvent {
    DocumentCreated {
        document_id: DocumentId,
        title: String,
        author: UserId,
        security_level: SecurityLevel,
        distribution: DistributionType,
        due_at: Option<DateTime<Utc>>,
        occurred_at: DateTime<Utc>,
    },
    DocumentAssigned {
        document_id: DocumentId,
        department: Option<DepartmentId>,
        handler: Option<UserId>,
        occurred_at: DateTime<Utc>,
    },
    ActionRecorded {
        document_id: DocumentId,
        actor: UserId,
        department: Option<DepartmentId>,
        stage: WorkflowStage,
        state: ActionState,
        comment: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    DocumentTypeSet {
        document_id: DocumentId,
        document_type: DocumentTypeId,
        actor: UserId,
        comment: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    StageAdvanced {
        document_id: DocumentId,
        from: WorkflowStage,
        to: WorkflowStage,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for DocumentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DocumentEvent::DocumentCreated { .. } => "documents.document.created",
            DocumentEvent::DocumentAssigned { .. } => "documents.document.assigned",
            DocumentEvent::ActionRecorded { .. } => "documents.document.action_recorded",
            DocumentEvent::DocumentTypeSet { .. } => "documents.document.type_set",
            DocumentEvent::StageAdvanced { .. } => "documents.document.stage_advanced",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DocumentEvent::DocumentCreated { occurred_at, .. }
            | DocumentEvent::DocumentAssigned { occurred_at, .. }
            | DocumentEvent::ActionRecorded { occurred_at, .. }
            | DocumentEvent::DocumentTypeSet { occurred_at, .. }
            | DocumentEvent::StageAdvanced { occurred_at, .. } => *occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// Document aggregate root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub author: UserId,
    pub document_type: Option<DocumentTypeId>,
    pub stage: WorkflowStage,
    pub security_level: SecurityLevel,
    pub distribution: DistributionType,
    pub assigned_department: Option<DepartmentId>,
    pub assigned_handler: Option<UserId>,
    pub due_at: Option<DateTime<Utc>>,
    pub actions: Vec<ActionRecord>,
    pub history: Vec<TypeChangeEntry>,
    version: u64,
    created: bool,
}

impl Document {
    /// Blank aggregate for rehydration.
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            title: String::new(),
            author: UserId::nil(),
            document_type: None,
            stage: WorkflowStage::Draft,
            security_level: SecurityLevel::Normal,
            distribution: DistributionType::Internal,
            assigned_department: None,
            assigned_handler: None,
            due_at: None,
            actions: Vec::new(),
            history: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Borrowed view for classification.
    pub fn facts(&self) -> DocumentFacts<'_> {
        DocumentFacts {
            stage: self.stage,
            author: self.author,
            assigned_department: self.assigned_department,
            assigned_handler: self.assigned_handler,
            actions: &self.actions,
        }
    }

    // ── command handlers ─────────────────────────────────────────────────────

    fn handle_create(
        &self,
        title: &str,
        author: UserId,
        security_level: SecurityLevel,
        distribution: DistributionType,
        due_at: Option<DateTime<Utc>>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Vec<DocumentEvent>> {
        if self.created {
            return Err(DomainError::conflict("document already exists"));
        }
        let title = title.trim().to_owned();
        if title.is_empty() {
            return Err(DomainError::validation("document title must not be empty"));
        }
        Ok(vec![DocumentEvent::DocumentCreated {
            document_id: self.id,
            title,
            author,
            security_level,
            distribution,
            due_at,
            occurred_at,
        }])
    }

    fn handle_assign(
        &self,
        department: Option<DepartmentId>,
        handler: Option<UserId>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Vec<DocumentEvent>> {
        self.ensure_created()?;
        if self.stage.is_terminal() {
            return Err(DomainError::invalid_transition(
                "archived documents cannot be reassigned",
            ));
        }
        if department.is_none() && handler.is_none() {
            return Err(DomainError::validation(
                "assignment requires a department or a handler",
            ));
        }
        Ok(vec![DocumentEvent::DocumentAssigned {
            document_id: self.id,
            department,
            handler,
            occurred_at,
        }])
    }

    fn handle_record_action(
        &self,
        actor_scope: &ActorScope,
        state: ActionState,
        comment: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Vec<DocumentEvent>> {
        self.ensure_created()?;
        if self.stage.is_terminal() {
            return Err(DomainError::invalid_transition(
                "archived documents accept no further actions",
            ));
        }
        match classify(&self.facts(), actor_scope) {
            Classification::NotApplicable => {
                return Err(DomainError::forbidden(
                    "document is not routed to this user",
                ));
            }
            Classification::Processed => {
                return Err(DomainError::conflict(
                    "action at this stage is already complete",
                ));
            }
            Classification::Processing if state == ActionState::Started => {
                return Err(DomainError::conflict("action is already in progress"));
            }
            Classification::Pending | Classification::Processing => {}
        }
        Ok(vec![DocumentEvent::ActionRecorded {
            document_id: self.id,
            actor: actor_scope.user_id,
            department: self.assigned_department,
            stage: self.stage,
            state,
            comment,
            occurred_at,
        }])
    }

    fn handle_set_type(
        &self,
        document_type: DocumentTypeId,
        actor_scope: &ActorScope,
        comment: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Vec<DocumentEvent>> {
        self.ensure_created()?;
        match classify(&self.facts(), actor_scope) {
            Classification::NotApplicable => {
                return Err(DomainError::forbidden(
                    "document is not routed to this user",
                ));
            }
            // Once a user's part at the current stage is behind them, they can
            // no longer reshape the document.
            Classification::Processed => {
                return Err(DomainError::invalid_transition(
                    "user has already finished processing this document",
                ));
            }
            Classification::Pending | Classification::Processing => {}
        }
        Ok(vec![DocumentEvent::DocumentTypeSet {
            document_id: self.id,
            document_type,
            actor: actor_scope.user_id,
            comment,
            occurred_at,
        }])
    }

    fn handle_advance(
        &self,
        actor_scope: &ActorScope,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Vec<DocumentEvent>> {
        self.ensure_created()?;
        let Some(next) = self.stage.next() else {
            return Err(DomainError::invalid_transition(
                "document is already archived",
            ));
        };
        match classify(&self.facts(), actor_scope) {
            Classification::NotApplicable => {
                return Err(DomainError::forbidden(
                    "document is not routed to this user",
                ));
            }
            Classification::Processed => {
                return Err(DomainError::invalid_transition(
                    "user has already finished processing this document",
                ));
            }
            Classification::Pending | Classification::Processing => {}
        }
        // Advancing IS the actor's completion at the current stage; no
        // separate action record is required first.
        Ok(vec![DocumentEvent::StageAdvanced {
            document_id: self.id,
            from: self.stage,
            to: next,
            actor: actor_scope.user_id,
            occurred_at,
        }])
    }

    fn ensure_created(&self) -> DomainResult<()> {
        if self.created {
            Ok(())
        } else {
            Err(DomainError::not_found())
        }
    }
}

impl AggregateRoot for Document {
    type Id = DocumentId;

    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for Document {
    type Command = DocumentCommand;
    type Event = DocumentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &DocumentEvent) {
        match event {
            DocumentEvent::DocumentCreated {
                document_id,
                title,
                author,
                security_level,
                distribution,
                due_at,
                ..
            } => {
                self.id = *document_id;
                self.title = title.clone();
                self.author = *author;
                self.security_level = *security_level;
                self.distribution = *distribution;
                self.due_at = *due_at;
                self.stage = WorkflowStage::Draft;
                self.created = true;
            }
            DocumentEvent::DocumentAssigned {
                department, handler, ..
            } => {
                if department.is_some() {
                    self.assigned_department = *department;
                }
                if handler.is_some() {
                    self.assigned_handler = *handler;
                }
            }
            DocumentEvent::ActionRecorded {
                actor,
                department,
                stage,
                state,
                comment,
                occurred_at,
                ..
            } => {
                self.actions.push(ActionRecord {
                    actor: *actor,
                    department: *department,
                    stage: *stage,
                    state: *state,
                    comment: comment.clone(),
                    occurred_at: *occurred_at,
                });
            }
            DocumentEvent::DocumentTypeSet {
                document_type,
                actor,
                comment,
                occurred_at,
                ..
            } => {
                self.document_type = Some(*document_type);
                self.history.push(TypeChangeEntry {
                    document_type: *document_type,
                    actor: *actor,
                    occurred_at: *occurred_at,
                    comment: comment.clone(),
                });
            }
            DocumentEvent::StageAdvanced { to, .. } => {
                self.stage = *to;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &DocumentCommand) -> Result<Vec<DocumentEvent>, DomainError> {
        match command {
            DocumentCommand::CreateDocument {
                title,
                author,
                security_level,
                distribution,
                due_at,
                occurred_at,
            } => self.handle_create(
                title,
                *author,
                *security_level,
                *distribution,
                *due_at,
                *occurred_at,
            ),
            DocumentCommand::AssignDocument {
                department,
                handler,
                occurred_at,
            } => self.handle_assign(*department, *handler, *occurred_at),
            DocumentCommand::RecordAction {
                actor_scope,
                state,
                comment,
                occurred_at,
            } => self.handle_record_action(actor_scope, *state, comment.clone(), *occurred_at),
            DocumentCommand::SetDocumentType {
                document_type,
                actor_scope,
                comment,
                occurred_at,
            } => self.handle_set_type(
                *document_type,
                actor_scope,
                comment.clone(),
                *occurred_at,
            ),
            DocumentCommand::AdvanceStage {
                actor_scope,
                occurred_at,
            } => self.handle_advance(actor_scope, *occurred_at),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn drive(doc: &mut Document, command: DocumentCommand) -> Vec<DocumentEvent> {
        let events = doc.handle(&command).expect("command should succeed");
        for event in &events {
            doc.apply(event);
        }
        events
    }

    fn created_document(author: UserId) -> Document {
        let mut doc = Document::empty(DocumentId::new());
        drive(
            &mut doc,
            DocumentCommand::CreateDocument {
                title: "Quarterly budget memo".into(),
                author,
                security_level: SecurityLevel::Normal,
                distribution: DistributionType::Internal,
                due_at: None,
                occurred_at: Utc::now(),
            },
        );
        doc
    }

    #[test]
    fn creation_starts_in_draft() {
        let author = UserId::new();
        let doc = created_document(author);
        assert!(doc.is_created());
        assert_eq!(doc.stage, WorkflowStage::Draft);
        assert_eq!(doc.author, author);
        assert_eq!(doc.version(), 1);
    }

    #[test]
    fn blank_title_rejected() {
        let doc = Document::empty(DocumentId::new());
        let err = doc
            .handle(&DocumentCommand::CreateDocument {
                title: "   ".into(),
                author: UserId::new(),
                security_level: SecurityLevel::Normal,
                distribution: DistributionType::Internal,
                due_at: None,
                occurred_at: Utc::now(),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn commands_against_missing_document_are_not_found() {
        let doc = Document::empty(DocumentId::new());
        let err = doc
            .handle(&DocumentCommand::AssignDocument {
                department: Some(DepartmentId::new()),
                handler: None,
                occurred_at: Utc::now(),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[test]
    fn assignment_requires_a_target() {
        let doc = created_document(UserId::new());
        let err = doc
            .handle(&DocumentCommand::AssignDocument {
                department: None,
                handler: None,
                occurred_at: Utc::now(),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn department_review_scenario() {
        let author = UserId::new();
        let dept = DepartmentId::new();
        let reviewer = UserId::new();
        let reviewer_scope = ActorScope::direct(reviewer, dept);

        let mut doc = created_document(author);
        drive(
            &mut doc,
            DocumentCommand::AssignDocument {
                department: Some(dept),
                handler: None,
                occurred_at: Utc::now(),
            },
        );
        // Author moves it forward into the department's hands.
        let author_scope = ActorScope::detached(author);
        drive(
            &mut doc,
            DocumentCommand::AdvanceStage {
                actor_scope: author_scope,
                occurred_at: Utc::now(),
            },
        );
        assert_eq!(doc.stage, WorkflowStage::Submitted);

        assert_eq!(
            classify(&doc.facts(), &reviewer_scope),
            Classification::Pending
        );

        drive(
            &mut doc,
            DocumentCommand::RecordAction {
                actor_scope: reviewer_scope.clone(),
                state: ActionState::Completed,
                comment: Some("reviewed".into()),
                occurred_at: Utc::now(),
            },
        );
        assert_eq!(
            classify(&doc.facts(), &reviewer_scope),
            Classification::Processed
        );
    }

    #[test]
    fn duplicate_completion_is_a_conflict() {
        let dept = DepartmentId::new();
        let reviewer = UserId::new();
        let scope = ActorScope::direct(reviewer, dept);

        let mut doc = created_document(UserId::new());
        drive(
            &mut doc,
            DocumentCommand::AssignDocument {
                department: Some(dept),
                handler: None,
                occurred_at: Utc::now(),
            },
        );
        // Push into Submitted so the department owes the action.
        doc.apply(&DocumentEvent::StageAdvanced {
            document_id: doc.id,
            from: WorkflowStage::Draft,
            to: WorkflowStage::Submitted,
            actor: doc.author,
            occurred_at: Utc::now(),
        });

        drive(
            &mut doc,
            DocumentCommand::RecordAction {
                actor_scope: scope.clone(),
                state: ActionState::Completed,
                comment: None,
                occurred_at: Utc::now(),
            },
        );
        let err = doc
            .handle(&DocumentCommand::RecordAction {
                actor_scope: scope,
                state: ActionState::Completed,
                comment: None,
                occurred_at: Utc::now(),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn outsider_cannot_record_actions() {
        let mut doc = created_document(UserId::new());
        drive(
            &mut doc,
            DocumentCommand::AssignDocument {
                department: Some(DepartmentId::new()),
                handler: None,
                occurred_at: Utc::now(),
            },
        );
        let outsider = ActorScope::direct(UserId::new(), DepartmentId::new());
        let err = doc
            .handle(&DocumentCommand::RecordAction {
                actor_scope: outsider,
                state: ActionState::Started,
                comment: None,
                occurred_at: Utc::now(),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn type_changes_append_to_history() {
        let author = UserId::new();
        let mut doc = created_document(author);
        let scope = ActorScope::detached(author);

        let first = DocumentTypeId::new();
        let second = DocumentTypeId::new();
        drive(
            &mut doc,
            DocumentCommand::SetDocumentType {
                document_type: first,
                actor_scope: scope.clone(),
                comment: None,
                occurred_at: Utc::now(),
            },
        );
        drive(
            &mut doc,
            DocumentCommand::SetDocumentType {
                document_type: second,
                actor_scope: scope,
                comment: Some("reclassified".into()),
                occurred_at: Utc::now(),
            },
        );

        assert_eq!(doc.document_type, Some(second));
        assert_eq!(doc.history.len(), 2);
        assert_eq!(doc.history[0].document_type, first);
        assert_eq!(doc.history[1].document_type, second);
    }

    #[test]
    fn processed_user_cannot_change_type() {
        let dept = DepartmentId::new();
        let reviewer = UserId::new();
        let scope = ActorScope::direct(reviewer, dept);

        let mut doc = created_document(UserId::new());
        drive(
            &mut doc,
            DocumentCommand::AssignDocument {
                department: Some(dept),
                handler: None,
                occurred_at: Utc::now(),
            },
        );
        doc.apply(&DocumentEvent::StageAdvanced {
            document_id: doc.id,
            from: WorkflowStage::Draft,
            to: WorkflowStage::Submitted,
            actor: doc.author,
            occurred_at: Utc::now(),
        });
        drive(
            &mut doc,
            DocumentCommand::RecordAction {
                actor_scope: scope.clone(),
                state: ActionState::Completed,
                comment: None,
                occurred_at: Utc::now(),
            },
        );

        let err = doc
            .handle(&DocumentCommand::SetDocumentType {
                document_type: DocumentTypeId::new(),
                actor_scope: scope,
                comment: None,
                occurred_at: Utc::now(),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn stages_advance_strictly_forward() {
        let author = UserId::new();
        let dept = DepartmentId::new();
        let member = UserId::new();
        let mut doc = created_document(author);
        drive(
            &mut doc,
            DocumentCommand::AssignDocument {
                department: Some(dept),
                handler: Some(member),
                occurred_at: Utc::now(),
            },
        );

        let mut previous = doc.stage;
        let scopes = [
            ActorScope::detached(author),
            ActorScope::direct(member, dept),
            ActorScope::direct(member, dept),
            ActorScope::direct(member, dept),
        ];
        for scope in scopes {
            drive(
                &mut doc,
                DocumentCommand::AdvanceStage {
                    actor_scope: scope,
                    occurred_at: Utc::now(),
                },
            );
            assert!(doc.stage > previous);
            previous = doc.stage;
        }
        assert_eq!(doc.stage, WorkflowStage::Dispatched);
    }

    #[test]
    fn archived_is_terminal() {
        let mut doc = created_document(UserId::new());
        doc.stage = WorkflowStage::Archived;

        let err = doc
            .handle(&DocumentCommand::AssignDocument {
                department: Some(DepartmentId::new()),
                handler: None,
                occurred_at: Utc::now(),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));

        let err = doc
            .handle(&DocumentCommand::AdvanceStage {
                actor_scope: ActorScope::detached(doc.author),
                occurred_at: Utc::now(),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn rehydration_reaches_the_same_state() {
        let author = UserId::new();
        let dept = DepartmentId::new();
        let mut doc = Document::empty(DocumentId::new());
        let mut journal: Vec<DocumentEvent> = Vec::new();

        journal.extend(drive(
            &mut doc,
            DocumentCommand::CreateDocument {
                title: "Site survey report".into(),
                author,
                security_level: SecurityLevel::Confidential,
                distribution: DistributionType::Incoming,
                due_at: None,
                occurred_at: Utc::now(),
            },
        ));
        journal.extend(drive(
            &mut doc,
            DocumentCommand::AssignDocument {
                department: Some(dept),
                handler: None,
                occurred_at: Utc::now(),
            },
        ));

        let mut replayed = Document::empty(doc.id);
        for event in &journal {
            replayed.apply(event);
        }
        assert_eq!(replayed.assigned_department, Some(dept));
        assert_eq!(replayed.stage, doc.stage);
        assert_eq!(replayed.version(), doc.version());
        assert_eq!(replayed.title, doc.title);
    }
}

//! Document workflow orchestration.
//!
//! Thin application layer over the command dispatcher: resolve registry and
//! read-model preconditions the aggregate cannot see, dispatch the command,
//! and hand back the post-mutation read model.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use docflow_core::{DepartmentId, UserId};
use docflow_documents::{
    ActionState, ActorScope, Document, DocumentCommand, DocumentId, DocumentTypeId,
    DistributionType, SecurityLevel,
};
use docflow_events::{EventBus, EventEnvelope};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::projections::{DocumentReadModel, DocumentsProjection};
use crate::read_model::KeyedStore;

/// Stream type identifier for document aggregates.
pub const DOCUMENT_AGGREGATE: &str = "documents.document";

// ─────────────────────────────────────────────────────────────────────────────
// Document type registry
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTypeDef {
    pub id: DocumentTypeId,
    pub name: String,
}

/// Registry of assignable document types.
///
/// Types are reference data, not event-sourced: they are seeded at bootstrap
/// and consulted before a `SetDocumentType` dispatch.
#[derive(Debug, Default)]
pub struct DocumentTypeRegistry {
    types: RwLock<HashMap<DocumentTypeId, DocumentTypeDef>>,
}

impl DocumentTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>) -> DocumentTypeId {
        let def = DocumentTypeDef {
            id: DocumentTypeId::new(),
            name: name.into(),
        };
        let id = def.id;
        if let Ok(mut types) = self.types.write() {
            types.insert(id, def);
        }
        id
    }

    pub fn contains(&self, id: DocumentTypeId) -> bool {
        self.types.read().map(|t| t.contains_key(&id)).unwrap_or(false)
    }

    pub fn get(&self, id: DocumentTypeId) -> Option<DocumentTypeDef> {
        self.types.read().ok()?.get(&id).cloned()
    }

    pub fn list(&self) -> Vec<DocumentTypeDef> {
        let mut defs: Vec<_> = match self.types.read() {
            Ok(types) => types.values().cloned().collect(),
            Err(_) => vec![],
        };
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workflow service
// ─────────────────────────────────────────────────────────────────────────────

pub struct WorkflowService<'a, S, B, D>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    D: KeyedStore<DocumentId, DocumentReadModel>,
{
    dispatcher: &'a CommandDispatcher<S, B>,
    documents: DocumentsProjection<D>,
    registry: &'a DocumentTypeRegistry,
}

impl<'a, S, B, D> WorkflowService<'a, S, B, D>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    D: KeyedStore<DocumentId, DocumentReadModel>,
{
    pub fn new(
        dispatcher: &'a CommandDispatcher<S, B>,
        documents: DocumentsProjection<D>,
        registry: &'a DocumentTypeRegistry,
    ) -> Self {
        Self {
            dispatcher,
            documents,
            registry,
        }
    }

    pub fn document(&self, id: DocumentId) -> Option<DocumentReadModel> {
        self.documents.document(id)
    }

    /// Resolved type definition of a document, if one has been set.
    pub fn document_type(&self, id: DocumentId) -> Option<DocumentTypeDef> {
        self.documents
            .document(id)?
            .document_type
            .and_then(|t| self.registry.get(t))
    }

    pub fn create_document(
        &self,
        title: String,
        author: UserId,
        security_level: SecurityLevel,
        distribution: DistributionType,
        due_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<DocumentReadModel, DispatchError> {
        let id = DocumentId::new();
        self.dispatch(
            id,
            DocumentCommand::CreateDocument {
                title,
                author,
                security_level,
                distribution,
                due_at,
                occurred_at: Utc::now(),
            },
        )
    }

    pub fn assign_document(
        &self,
        id: DocumentId,
        department: Option<DepartmentId>,
        handler: Option<UserId>,
    ) -> Result<DocumentReadModel, DispatchError> {
        self.dispatch(
            id,
            DocumentCommand::AssignDocument {
                department,
                handler,
                occurred_at: Utc::now(),
            },
        )
    }

    pub fn record_action(
        &self,
        id: DocumentId,
        actor_scope: ActorScope,
        state: ActionState,
        comment: Option<String>,
    ) -> Result<DocumentReadModel, DispatchError> {
        self.dispatch(
            id,
            DocumentCommand::RecordAction {
                actor_scope,
                state,
                comment,
                occurred_at: Utc::now(),
            },
        )
    }

    /// Set (or change) a document's type after checking the registry.
    pub fn set_document_type(
        &self,
        id: DocumentId,
        document_type: DocumentTypeId,
        actor_scope: ActorScope,
        comment: Option<String>,
    ) -> Result<DocumentReadModel, DispatchError> {
        if !self.registry.contains(document_type) {
            return Err(DispatchError::NotFound);
        }
        self.dispatch(
            id,
            DocumentCommand::SetDocumentType {
                document_type,
                actor_scope,
                comment,
                occurred_at: Utc::now(),
            },
        )
    }

    pub fn advance_stage(
        &self,
        id: DocumentId,
        actor_scope: ActorScope,
    ) -> Result<DocumentReadModel, DispatchError> {
        self.dispatch(
            id,
            DocumentCommand::AdvanceStage {
                actor_scope,
                occurred_at: Utc::now(),
            },
        )
    }

    fn dispatch(
        &self,
        id: DocumentId,
        command: DocumentCommand,
    ) -> Result<DocumentReadModel, DispatchError> {
        self.dispatcher.dispatch::<Document>(
            id.as_aggregate_id(),
            DOCUMENT_AGGREGATE,
            command,
            |aggregate_id| Document::empty(aggregate_id.into()),
        )?;
        // The projection consumed the publication synchronously in-process;
        // hand back the fresh read model.
        self.documents.document(id).ok_or(DispatchError::NotFound)
    }
}

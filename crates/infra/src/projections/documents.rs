//! Documents projection (workflow read models).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docflow_core::{DepartmentId, UserId};
use docflow_documents::{
    ActionRecord, DistributionType, DocumentEvent, DocumentFacts, DocumentId, DocumentTypeId,
    SecurityLevel, TypeChangeEntry, WorkflowStage,
};
use docflow_events::EventEnvelope;

use crate::read_model::KeyedStore;

/// Document read model mirroring the aggregate, including the action log and
/// type history so classification can run without touching the event store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReadModel {
    pub document_id: DocumentId,
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentReadModel {
    pub fn facts(&self) -> DocumentFacts<'_> {
        DocumentFacts {
            stage: self.stage,
            author: self.author,
            assigned_department: self.assigned_department,
            assigned_handler: self.assigned_handler,
            actions: &self.actions,
        }
    }
}

/// Projection that maintains per-document workflow state.
pub struct DocumentsProjection<S> {
    store: S,
}

impl<S> DocumentsProjection<S>
where
    S: KeyedStore<DocumentId, DocumentReadModel>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn document(&self, id: DocumentId) -> Option<DocumentReadModel> {
        self.store.get(&id)
    }

    pub fn all(&self) -> Vec<DocumentReadModel> {
        self.store.list()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<serde_json::Value>,
    ) -> Result<(), anyhow::Error> {
        if !envelope.aggregate_type().starts_with("documents.document") {
            return Ok(());
        }

        let event: DocumentEvent = serde_json::from_value(envelope.payload().clone())?;
        match event {
            DocumentEvent::DocumentCreated {
                document_id,
                title,
                author,
                security_level,
                distribution,
                due_at,
                occurred_at,
            } => {
                self.store.upsert(
                    document_id,
                    DocumentReadModel {
                        document_id,
                        title,
                        author,
                        document_type: None,
                        stage: WorkflowStage::Draft,
                        security_level,
                        distribution,
                        assigned_department: None,
                        assigned_handler: None,
                        due_at,
                        actions: Vec::new(),
                        history: Vec::new(),
                        created_at: occurred_at,
                        updated_at: occurred_at,
                    },
                );
            }
            DocumentEvent::DocumentAssigned {
                document_id,
                department,
                handler,
                occurred_at,
            } => {
                self.touch(document_id, occurred_at, |m| {
                    if department.is_some() {
                        m.assigned_department = department;
                    }
                    if handler.is_some() {
                        m.assigned_handler = handler;
                    }
                });
            }
            DocumentEvent::ActionRecorded {
                document_id,
                actor,
                department,
                stage,
                state,
                comment,
                occurred_at,
            } => {
                self.touch(document_id, occurred_at, |m| {
                    m.actions.push(ActionRecord {
                        actor,
                        department,
                        stage,
                        state,
                        comment,
                        occurred_at,
                    });
                });
            }
            DocumentEvent::DocumentTypeSet {
                document_id,
                document_type,
                actor,
                comment,
                occurred_at,
            } => {
                self.touch(document_id, occurred_at, |m| {
                    m.document_type = Some(document_type);
                    m.history.push(TypeChangeEntry {
                        document_type,
                        actor,
                        occurred_at,
                        comment,
                    });
                });
            }
            DocumentEvent::StageAdvanced {
                document_id,
                to,
                occurred_at,
                ..
            } => {
                self.touch(document_id, occurred_at, |m| {
                    m.stage = to;
                });
            }
        }
        Ok(())
    }

    fn touch(
        &self,
        id: DocumentId,
        at: DateTime<Utc>,
        f: impl FnOnce(&mut DocumentReadModel),
    ) {
        if let Some(mut model) = self.store.get(&id) {
            f(&mut model);
            model.updated_at = at;
            self.store.upsert(id, model);
        }
    }
}

//! Notification fan-out from published events.
//!
//! Consumes envelopes and turns workflow activity into inbox rows for the
//! users the document concerns. Fan-out is best-effort: a failed insert is
//! logged and never fails the operation that produced the event.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use docflow_core::{DepartmentId, UserId};
use docflow_documents::{DocumentEvent, DocumentId};
use docflow_events::EventEnvelope;
use docflow_identity::UserEvent;
use docflow_notify::{EntityRef, NotificationService, NotificationStore, NotificationType};

use crate::projections::{DocumentReadModel, DocumentsProjection, UserReadModel, UsersProjection};
use crate::read_model::KeyedStore;

pub struct NotificationsFanout<S, U, D>
where
    S: NotificationStore,
    U: KeyedStore<UserId, UserReadModel>,
    D: KeyedStore<DocumentId, DocumentReadModel>,
{
    service: NotificationService<S>,
    users: UsersProjection<U>,
    documents: DocumentsProjection<D>,
}

impl<S, U, D> NotificationsFanout<S, U, D>
where
    S: NotificationStore,
    U: KeyedStore<UserId, UserReadModel>,
    D: KeyedStore<DocumentId, DocumentReadModel>,
{
    pub fn new(
        service: NotificationService<S>,
        users: UsersProjection<U>,
        documents: DocumentsProjection<D>,
    ) -> Self {
        Self {
            service,
            users,
            documents,
        }
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<serde_json::Value>,
    ) -> Result<(), anyhow::Error> {
        if envelope.aggregate_type().starts_with("documents.document") {
            let event: DocumentEvent = serde_json::from_value(envelope.payload().clone())?;
            self.fan_out_document(&event);
        } else if envelope.aggregate_type().starts_with("identity.user") {
            let event: UserEvent = serde_json::from_value(envelope.payload().clone())?;
            if let UserEvent::Approved(e) = event {
                self.notify(
                    e.user_id,
                    NotificationType::AccountApproved,
                    "Your account has been approved".to_string(),
                    Some(EntityRef::User(Uuid::from(e.user_id))),
                    e.occurred_at,
                );
            }
        }
        Ok(())
    }

    fn fan_out_document(&self, event: &DocumentEvent) {
        match event {
            DocumentEvent::DocumentCreated { .. } => {}
            DocumentEvent::DocumentAssigned {
                document_id,
                department,
                handler,
                occurred_at,
            } => {
                if let Some(handler) = handler {
                    self.notify(
                        *handler,
                        NotificationType::DocumentAssigned,
                        "A document has been assigned to you".to_string(),
                        Some(document_ref(*document_id)),
                        *occurred_at,
                    );
                }
                if let Some(department) = department {
                    for member in self.members_of(*department) {
                        if Some(member) == *handler {
                            continue;
                        }
                        self.notify(
                            member,
                            NotificationType::DocumentAssigned,
                            "A document has been routed to your department".to_string(),
                            Some(document_ref(*document_id)),
                            *occurred_at,
                        );
                    }
                }
            }
            DocumentEvent::ActionRecorded {
                document_id,
                actor,
                occurred_at,
                ..
            } => {
                self.notify_author(
                    *document_id,
                    *actor,
                    NotificationType::ActionRecorded,
                    "Action recorded on your document".to_string(),
                    *occurred_at,
                );
            }
            DocumentEvent::DocumentTypeSet {
                document_id,
                actor,
                occurred_at,
                ..
            } => {
                self.notify_author(
                    *document_id,
                    *actor,
                    NotificationType::DocumentTypeChanged,
                    "Your document's type has been changed".to_string(),
                    *occurred_at,
                );
            }
            DocumentEvent::StageAdvanced {
                document_id,
                actor,
                to,
                occurred_at,
                ..
            } => {
                self.notify_author(
                    *document_id,
                    *actor,
                    NotificationType::StageAdvanced,
                    format!("Your document moved to {to:?}"),
                    *occurred_at,
                );
            }
        }
    }

    /// Notify the document's author unless the author is the acting user.
    fn notify_author(
        &self,
        document_id: DocumentId,
        actor: UserId,
        kind: NotificationType,
        title: String,
        at: DateTime<Utc>,
    ) {
        let Some(doc) = self.documents.document(document_id) else {
            return;
        };
        if doc.author == actor {
            return;
        }
        self.notify(doc.author, kind, title, Some(document_ref(document_id)), at);
    }

    fn members_of(&self, department: DepartmentId) -> Vec<UserId> {
        self.users
            .in_department(department)
            .into_iter()
            .map(|u| u.user_id)
            .collect()
    }

    fn notify(
        &self,
        recipient: UserId,
        kind: NotificationType,
        title: String,
        entity: Option<EntityRef>,
        at: DateTime<Utc>,
    ) {
        if let Err(err) = self.service.create(recipient, kind, title, None, entity, at) {
            warn!(%recipient, error = %err, "notification fan-out failed");
        }
    }
}

fn document_ref(id: DocumentId) -> EntityRef {
    EntityRef::Document(Uuid::from(id.as_aggregate_id()))
}

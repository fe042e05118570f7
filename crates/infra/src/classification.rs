//! Classification queries over the read models.
//!
//! The pure policy lives in `docflow-documents`; this service only resolves
//! the inputs (user, department reach, document state) and feeds them in. The
//! actor scope is built once per call, so summarizing N documents costs one
//! tree walk plus N set lookups.

use docflow_core::{DomainError, DomainResult, UserId};
use docflow_documents::{ActorScope, Classification, DocumentId, ProcessingSummary, classify, summarize};

use crate::projections::{
    DepartmentReadModel, DepartmentsProjection, DocumentReadModel, DocumentsProjection,
    UserReadModel, UsersProjection,
};
use crate::read_model::KeyedStore;

/// Read-side classification over the projected documents.
pub struct ClassificationService<U, D, O>
where
    U: KeyedStore<UserId, UserReadModel>,
    D: KeyedStore<DocumentId, DocumentReadModel>,
    O: KeyedStore<docflow_core::DepartmentId, DepartmentReadModel>,
{
    users: UsersProjection<U>,
    documents: DocumentsProjection<D>,
    departments: DepartmentsProjection<O>,
}

impl<U, D, O> ClassificationService<U, D, O>
where
    U: KeyedStore<UserId, UserReadModel>,
    D: KeyedStore<DocumentId, DocumentReadModel>,
    O: KeyedStore<docflow_core::DepartmentId, DepartmentReadModel>,
{
    pub fn new(
        users: UsersProjection<U>,
        documents: DocumentsProjection<D>,
        departments: DepartmentsProjection<O>,
    ) -> Self {
        Self {
            users,
            documents,
            departments,
        }
    }

    /// Resolve a user's reach over the department tree.
    pub fn scope_for(&self, user_id: UserId) -> DomainResult<ActorScope> {
        let user = self.users.by_id(user_id).ok_or(DomainError::NotFound)?;
        Ok(match user.department {
            Some(dept) => ActorScope {
                user_id,
                department: Some(dept),
                oversight: self.departments.descendants_of(dept),
            },
            None => ActorScope::detached(user_id),
        })
    }

    /// Classify one document for one user.
    pub fn classify_for(
        &self,
        document_id: DocumentId,
        user_id: UserId,
    ) -> DomainResult<Classification> {
        let scope = self.scope_for(user_id)?;
        let document = self
            .documents
            .document(document_id)
            .ok_or(DomainError::NotFound)?;
        Ok(classify(&document.facts(), &scope))
    }

    /// Per-user counts over every document in the system.
    pub fn summary_for(&self, user_id: UserId) -> DomainResult<ProcessingSummary> {
        let scope = self.scope_for(user_id)?;
        let documents = self.documents.all();
        Ok(summarize(documents.iter().map(|d| d.facts()), &scope))
    }

    /// Documents visible to the user (anything not `NotApplicable`), with
    /// their per-user status.
    pub fn inbox_for(
        &self,
        user_id: UserId,
    ) -> DomainResult<Vec<(DocumentReadModel, Classification)>> {
        let scope = self.scope_for(user_id)?;
        let mut rows: Vec<_> = self
            .documents
            .all()
            .into_iter()
            .filter_map(|doc| {
                let status = classify(&doc.facts(), &scope);
                status.is_applicable().then_some((doc, status))
            })
            .collect();
        rows.sort_by(|a, b| b.0.updated_at.cmp(&a.0.updated_at));
        Ok(rows)
    }
}

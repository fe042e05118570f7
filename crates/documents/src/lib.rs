//! `docflow-documents` — document workflow and the per-user classification
//! engine.
//!
//! `document` holds the aggregate (stages, assignment, actions, audit
//! history); `classify` holds the pure status engine that decides what a
//! document means *for a given user*.

pub mod classify;
pub mod document;

pub use classify::{
    ActorScope, Classification, ProcessingSummary, Relation, classify, relation, summarize,
};
pub use document::{
    ActionRecord, ActionState, Document, DocumentCommand, DocumentEvent, DocumentFacts, DocumentId,
    DocumentTypeId, DistributionType, SecurityLevel, StageActor, TypeChangeEntry, WorkflowStage,
};

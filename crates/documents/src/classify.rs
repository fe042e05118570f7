//! Per-user document classification.
//!
//! `classify` answers one question: what does this document mean *for this
//! user*? The answer is never stored; it is recomputed from the document's
//! workflow position and the user's place in the department tree.
//!
//! - No IO
//! - No panics
//! - No mutation (pure policy check)
//!
//! Scope resolution is most-specific-first: assigned handler beats author,
//! author beats department membership, and ancestor-department oversight is
//! considered only when nothing more specific applies.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use docflow_core::{DepartmentId, UserId};

use crate::document::{ActionState, DocumentFacts, StageActor, WorkflowStage};

/// Per-user processing status of a document.
///
/// `NotApplicable` is an explicit marker, not an error and not `Pending`: the
/// document is simply outside this user's reach and is excluded from their
/// summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    NotApplicable,
    Pending,
    Processing,
    Processed,
}

impl Classification {
    pub fn is_applicable(&self) -> bool {
        !matches!(self, Classification::NotApplicable)
    }
}

/// How a user is connected to a document, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The user is the designated handler.
    Handler,
    /// The user authored the document.
    Author,
    /// The user belongs to the assigned department.
    DepartmentMember,
    /// The user belongs to a strict ancestor of the assigned department.
    Oversight,
}

/// A user's reach over the department tree, resolved once per request.
///
/// `oversight` holds the user's own department plus every descendant, so the
/// per-document reachability check is a set lookup instead of a tree walk.
/// Build it once per summary call; never per document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorScope {
    pub user_id: UserId,
    pub department: Option<DepartmentId>,
    pub oversight: BTreeSet<DepartmentId>,
}

impl ActorScope {
    /// Scope for a user with no department (authors/handlers only).
    pub fn detached(user_id: UserId) -> Self {
        Self {
            user_id,
            department: None,
            oversight: BTreeSet::new(),
        }
    }

    /// Scope covering exactly the user's own department (no oversight).
    pub fn direct(user_id: UserId, department: DepartmentId) -> Self {
        Self {
            user_id,
            department: Some(department),
            oversight: BTreeSet::from([department]),
        }
    }
}

/// Resolve the most specific relation between a user and a document, if any.
pub fn relation(facts: &DocumentFacts<'_>, scope: &ActorScope) -> Option<Relation> {
    if facts.assigned_handler == Some(scope.user_id) {
        return Some(Relation::Handler);
    }
    if facts.author == scope.user_id {
        return Some(Relation::Author);
    }
    if let Some(assigned) = facts.assigned_department {
        if scope.department == Some(assigned) {
            return Some(Relation::DepartmentMember);
        }
        if scope.oversight.contains(&assigned) {
            return Some(Relation::Oversight);
        }
    }
    None
}

/// Classify a document for one user.
///
/// Idempotent and side-effect-free: calling it any number of times without an
/// intervening mutation yields the same status.
pub fn classify(facts: &DocumentFacts<'_>, scope: &ActorScope) -> Classification {
    let Some(rel) = relation(facts, scope) else {
        return Classification::NotApplicable;
    };

    match facts.stage.awaits() {
        StageActor::Nobody => Classification::Processed,

        StageActor::Author => personal_or_processed(facts, scope, facts.author),

        StageActor::AssignedHandler => match facts.assigned_handler {
            Some(handler) => personal_or_processed(facts, scope, handler),
            // No handler designated yet: the obligation falls back to the
            // assigned department.
            None => department_stage(facts, scope, rel),
        },

        StageActor::AssignedDepartment => department_stage(facts, scope, rel),
    }
}

fn department_stage(
    facts: &DocumentFacts<'_>,
    scope: &ActorScope,
    rel: Relation,
) -> Classification {
    match rel {
        // Members of the assigned department (and a designated handler) carry
        // a personal obligation at department stages.
        Relation::Handler | Relation::DepartmentMember => personal_state(facts, scope.user_id),
        // The author's required action is behind them once routing reaches a
        // department they don't belong to.
        Relation::Author => Classification::Processed,
        // Oversight tracks the assigned department's collective progress.
        Relation::Oversight => match facts.assigned_department {
            Some(dept) => collective_state(facts, dept),
            None => Classification::Processed,
        },
    }
}

fn personal_or_processed(
    facts: &DocumentFacts<'_>,
    scope: &ActorScope,
    responsible: UserId,
) -> Classification {
    if scope.user_id == responsible {
        personal_state(facts, scope.user_id)
    } else {
        // Someone more specific owes the action; this user has nothing left
        // to do at this stage.
        Classification::Processed
    }
}

fn personal_state(facts: &DocumentFacts<'_>, user: UserId) -> Classification {
    let mut started = false;
    for action in facts.actions {
        if action.stage != facts.stage || action.actor != user {
            continue;
        }
        match action.state {
            ActionState::Completed => return Classification::Processed,
            ActionState::Started => started = true,
        }
    }
    if started {
        Classification::Processing
    } else {
        Classification::Pending
    }
}

fn collective_state(facts: &DocumentFacts<'_>, department: DepartmentId) -> Classification {
    let mut started = false;
    for action in facts.actions {
        if action.stage != facts.stage || action.department != Some(department) {
            continue;
        }
        match action.state {
            ActionState::Completed => return Classification::Processed,
            ActionState::Started => started = true,
        }
    }
    if started {
        Classification::Processing
    } else {
        Classification::Pending
    }
}

/// Per-user summary counts over a document set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub pending: u64,
    pub processing: u64,
    pub processed: u64,
}

impl ProcessingSummary {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.processed
    }
}

/// Classify every document in the batch against one pre-resolved scope.
///
/// Linear in the number of documents; the ancestry work was already paid once
/// when `scope` was built.
pub fn summarize<'a>(
    docs: impl IntoIterator<Item = DocumentFacts<'a>>,
    scope: &ActorScope,
) -> ProcessingSummary {
    let mut summary = ProcessingSummary::default();
    for facts in docs {
        match classify(&facts, scope) {
            Classification::NotApplicable => {}
            Classification::Pending => summary.pending += 1,
            Classification::Processing => summary.processing += 1,
            Classification::Processed => summary.processed += 1,
        }
    }
    summary
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Department tree aggregate.
//!
//! The whole tree is a single aggregate: departments live in an arena keyed by
//! id, each node storing only its parent's id. Children are derived by query,
//! never stored, so there is no reference-cycle bookkeeping. Acyclicity is
//! actively enforced in exactly one place: reparenting.

use std::collections::{BTreeMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docflow_core::{Aggregate, AggregateId, AggregateRoot, DepartmentId, DomainError};
use docflow_events::Event;

/// A single node in the department arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentNode {
    pub name: String,
    pub parent: Option<DepartmentId>,
}

/// Aggregate root: the department tree of the organization.
///
/// # Invariants
/// - Parent chains are acyclic and finite (tree, not a general graph).
/// - A department has at most one parent.
/// - A parent reference always points at an existing department.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    id: AggregateId,
    departments: BTreeMap<DepartmentId, DepartmentNode>,
    version: u64,
}

impl Directory {
    /// Create an empty directory instance for rehydration.
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            departments: BTreeMap::new(),
            version: 0,
        }
    }

    pub fn contains(&self, id: DepartmentId) -> bool {
        self.departments.contains_key(&id)
    }

    pub fn get(&self, id: DepartmentId) -> Option<&DepartmentNode> {
        self.departments.get(&id)
    }

    pub fn len(&self) -> usize {
        self.departments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.departments.is_empty()
    }

    /// All departments with no parent, ordered by name (stable key).
    pub fn roots(&self) -> Vec<DepartmentId> {
        let mut roots: Vec<_> = self
            .departments
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .collect();
        roots.sort_by(|(aid, a), (bid, b)| a.name.cmp(&b.name).then(aid.cmp(bid)));
        roots.into_iter().map(|(id, _)| *id).collect()
    }

    /// Direct children of `id` (one level), ordered by name.
    pub fn children_of(&self, id: DepartmentId) -> Result<Vec<DepartmentId>, DomainError> {
        if !self.contains(id) {
            return Err(DomainError::NotFound);
        }
        let mut children: Vec<_> = self
            .departments
            .iter()
            .filter(|(_, node)| node.parent == Some(id))
            .collect();
        children.sort_by(|(aid, a), (bid, b)| a.name.cmp(&b.name).then(aid.cmp(bid)));
        Ok(children.into_iter().map(|(id, _)| *id).collect())
    }

    /// Parent chain of `id`, nearest ancestor first.
    pub fn ancestors_of(&self, id: DepartmentId) -> Result<Vec<DepartmentId>, DomainError> {
        if !self.contains(id) {
            return Err(DomainError::NotFound);
        }
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.departments.get(&id).and_then(|n| n.parent);
        while let Some(parent) = current {
            // Stop on repeats so a corrupted arena can never hang a walk.
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent);
            current = self.departments.get(&parent).and_then(|n| n.parent);
        }
        Ok(chain)
    }

    /// `id` plus every department transitively below it.
    pub fn descendants_of(&self, id: DepartmentId) -> Result<HashSet<DepartmentId>, DomainError> {
        if !self.contains(id) {
            return Err(DomainError::NotFound);
        }
        let mut out = HashSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            if !out.insert(current) {
                continue;
            }
            for (child, node) in &self.departments {
                if node.parent == Some(current) {
                    queue.push_back(*child);
                }
            }
        }
        Ok(out)
    }

    fn is_descendant(&self, candidate: DepartmentId, of: DepartmentId) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(candidate);
        while let Some(dept) = current {
            if dept == of {
                return true;
            }
            if !seen.insert(dept) {
                return false;
            }
            current = self.departments.get(&dept).and_then(|n| n.parent);
        }
        false
    }
}

impl AggregateRoot for Directory {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Command to create a department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDepartment {
    pub department_id: DepartmentId,
    pub name: String,
    pub parent: Option<DepartmentId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command to rename a department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameDepartment {
    pub department_id: DepartmentId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command to move a department under a new parent (or to the root).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReparentDepartment {
    pub department_id: DepartmentId,
    pub new_parent: Option<DepartmentId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectoryCommand {
    Create(CreateDepartment),
    Rename(RenameDepartment),
    Reparent(ReparentDepartment),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentCreated {
    pub department_id: DepartmentId,
    pub name: String,
    pub parent: Option<DepartmentId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentRenamed {
    pub department_id: DepartmentId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentReparented {
    pub department_id: DepartmentId,
    pub new_parent: Option<DepartmentId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectoryEvent {
    Created(DepartmentCreated),
    Renamed(DepartmentRenamed),
    Reparented(DepartmentReparented),
}

impl Event for DirectoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DirectoryEvent::Created(_) => "org.department.created",
            DirectoryEvent::Renamed(_) => "org.department.renamed",
            DirectoryEvent::Reparented(_) => "org.department.reparented",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DirectoryEvent::Created(e) => e.occurred_at,
            DirectoryEvent::Renamed(e) => e.occurred_at,
            DirectoryEvent::Reparented(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Directory {
    type Command = DirectoryCommand;
    type Event = DirectoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DirectoryEvent::Created(e) => {
                self.departments.insert(
                    e.department_id,
                    DepartmentNode {
                        name: e.name.clone(),
                        parent: e.parent,
                    },
                );
            }
            DirectoryEvent::Renamed(e) => {
                if let Some(node) = self.departments.get_mut(&e.department_id) {
                    node.name = e.name.clone();
                }
            }
            DirectoryEvent::Reparented(e) => {
                if let Some(node) = self.departments.get_mut(&e.department_id) {
                    node.parent = e.new_parent;
                }
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DirectoryCommand::Create(cmd) => self.handle_create(cmd),
            DirectoryCommand::Rename(cmd) => self.handle_rename(cmd),
            DirectoryCommand::Reparent(cmd) => self.handle_reparent(cmd),
        }
    }
}

impl Directory {
    fn handle_create(&self, cmd: &CreateDepartment) -> Result<Vec<DirectoryEvent>, DomainError> {
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("department name cannot be empty"));
        }
        if self.contains(cmd.department_id) {
            return Err(DomainError::conflict("department id already exists"));
        }
        if let Some(parent) = cmd.parent {
            if !self.contains(parent) {
                return Err(DomainError::NotFound);
            }
        }

        Ok(vec![DirectoryEvent::Created(DepartmentCreated {
            department_id: cmd.department_id,
            name: cmd.name.trim().to_string(),
            parent: cmd.parent,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rename(&self, cmd: &RenameDepartment) -> Result<Vec<DirectoryEvent>, DomainError> {
        if !self.contains(cmd.department_id) {
            return Err(DomainError::NotFound);
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("department name cannot be empty"));
        }

        Ok(vec![DirectoryEvent::Renamed(DepartmentRenamed {
            department_id: cmd.department_id,
            name: cmd.name.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reparent(&self, cmd: &ReparentDepartment) -> Result<Vec<DirectoryEvent>, DomainError> {
        if !self.contains(cmd.department_id) {
            return Err(DomainError::NotFound);
        }

        if let Some(new_parent) = cmd.new_parent {
            if !self.contains(new_parent) {
                return Err(DomainError::NotFound);
            }
            if new_parent == cmd.department_id {
                return Err(DomainError::invalid_hierarchy(
                    "department cannot be its own parent",
                ));
            }
            // The new parent must not sit below the moved department.
            if self.is_descendant(new_parent, cmd.department_id) {
                return Err(DomainError::invalid_hierarchy(
                    "new parent is a descendant of the department being moved",
                ));
            }
        }

        Ok(vec![DirectoryEvent::Reparented(DepartmentReparented {
            department_id: cmd.department_id,
            new_parent: cmd.new_parent,
            occurred_at: cmd.occurred_at,
        })])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn directory_with(names: &[(&str, Option<usize>)]) -> (Directory, Vec<DepartmentId>) {
        let mut dir = Directory::empty(AggregateId::new());
        let mut ids = Vec::new();
        for (name, parent_idx) in names {
            let id = DepartmentId::new();
            let cmd = DirectoryCommand::Create(CreateDepartment {
                department_id: id,
                name: name.to_string(),
                parent: parent_idx.map(|i| ids[i]),
                occurred_at: now(),
            });
            for event in dir.handle(&cmd).unwrap() {
                dir.apply(&event);
            }
            ids.push(id);
        }
        (dir, ids)
    }

    #[test]
    fn roots_are_parentless_and_name_ordered() {
        let (dir, ids) = directory_with(&[
            ("Van phong", None),
            ("Ke toan", None),
            ("Tong hop", Some(0)),
        ]);

        let roots = dir.roots();
        assert_eq!(roots, vec![ids[1], ids[0]]);
    }

    #[test]
    fn children_of_returns_one_level() {
        let (dir, ids) = directory_with(&[
            ("Root", None),
            ("B child", Some(0)),
            ("A child", Some(0)),
            ("Grandchild", Some(1)),
        ]);

        let children = dir.children_of(ids[0]).unwrap();
        assert_eq!(children, vec![ids[2], ids[1]]);
    }

    #[test]
    fn children_of_unknown_department_is_not_found() {
        let (dir, _) = directory_with(&[("Root", None)]);
        let err = dir.children_of(DepartmentId::new()).unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn reparent_to_own_descendant_is_rejected() {
        let (mut dir, ids) = directory_with(&[
            ("Root", None),
            ("Child", Some(0)),
            ("Grandchild", Some(1)),
        ]);

        let cmd = DirectoryCommand::Reparent(ReparentDepartment {
            department_id: ids[0],
            new_parent: Some(ids[2]),
            occurred_at: now(),
        });
        let err = dir.handle(&cmd).unwrap_err();
        assert!(matches!(err, DomainError::InvalidHierarchy(_)));

        // Self-parenting is the degenerate case of the same rule.
        let cmd = DirectoryCommand::Reparent(ReparentDepartment {
            department_id: ids[1],
            new_parent: Some(ids[1]),
            occurred_at: now(),
        });
        let err = dir.handle(&cmd).unwrap_err();
        assert!(matches!(err, DomainError::InvalidHierarchy(_)));

        // A legal move still works.
        let cmd = DirectoryCommand::Reparent(ReparentDepartment {
            department_id: ids[2],
            new_parent: Some(ids[0]),
            occurred_at: now(),
        });
        for event in dir.handle(&cmd).unwrap() {
            dir.apply(&event);
        }
        assert_eq!(dir.get(ids[2]).unwrap().parent, Some(ids[0]));
    }

    #[test]
    fn reparent_to_root_clears_parent() {
        let (mut dir, ids) = directory_with(&[("Root", None), ("Child", Some(0))]);

        let cmd = DirectoryCommand::Reparent(ReparentDepartment {
            department_id: ids[1],
            new_parent: None,
            occurred_at: now(),
        });
        for event in dir.handle(&cmd).unwrap() {
            dir.apply(&event);
        }

        assert_eq!(dir.get(ids[1]).unwrap().parent, None);
        assert_eq!(dir.roots().len(), 2);
    }

    #[test]
    fn ancestors_walk_nearest_first() {
        let (dir, ids) = directory_with(&[
            ("Root", None),
            ("Child", Some(0)),
            ("Grandchild", Some(1)),
        ]);

        assert_eq!(dir.ancestors_of(ids[2]).unwrap(), vec![ids[1], ids[0]]);
        assert_eq!(dir.ancestors_of(ids[0]).unwrap(), Vec::<DepartmentId>::new());
    }

    #[test]
    fn descendants_include_self_and_subtree() {
        let (dir, ids) = directory_with(&[
            ("Root", None),
            ("Child", Some(0)),
            ("Grandchild", Some(1)),
            ("Sibling", None),
        ]);

        let set = dir.descendants_of(ids[0]).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains(&ids[0]) && set.contains(&ids[1]) && set.contains(&ids[2]));
        assert!(!set.contains(&ids[3]));
    }

    fn parent_chain_terminates(dir: &Directory, start: DepartmentId) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(start);
        while let Some(dept) = current {
            if !seen.insert(dept) {
                return false;
            }
            current = dir.get(dept).and_then(|n| n.parent);
        }
        true
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: no accepted sequence of reparent commands can introduce a
        /// cycle; every parent chain still terminates afterwards.
        #[test]
        fn accepted_reparents_never_create_cycles(
            moves in prop::collection::vec((0usize..8, prop::option::of(0usize..8)), 0..40)
        ) {
            let (mut dir, ids) = directory_with(&[
                ("D0", None),
                ("D1", Some(0)),
                ("D2", Some(0)),
                ("D3", Some(1)),
                ("D4", Some(1)),
                ("D5", Some(2)),
                ("D6", None),
                ("D7", Some(6)),
            ]);

            for (target, parent) in moves {
                let cmd = DirectoryCommand::Reparent(ReparentDepartment {
                    department_id: ids[target],
                    new_parent: parent.map(|p| ids[p]),
                    occurred_at: now(),
                });
                // Rejected moves are simply skipped; accepted ones are applied.
                if let Ok(events) = dir.handle(&cmd) {
                    for event in events {
                        dir.apply(&event);
                    }
                }
            }

            for id in &ids {
                prop_assert!(parent_chain_terminates(&dir, *id));
            }
        }
    }
}

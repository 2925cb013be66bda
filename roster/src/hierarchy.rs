//! Structural rules for the group hierarchy.
//!
//! The store only guarantees that a `parent_id` points at an existing row. Everything else
//! that keeps the hierarchy a forest is checked here, before the repository issues a write:
//!
//! - a group is never its own parent
//! - a group is never its own ancestor (no cycles)
//! - a parent must exist
//! - only leaf groups can be deleted
//!
//! The functions are pure: the repository loads a [`ParentIndex`] inside the same
//! transaction that performs the write and hands it in.

use crate::types::GroupId;
use std::collections::HashMap;
use thiserror::Error;

/// A rejected hierarchy mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyViolation {
    #[error("Group cannot be its own parent")]
    SelfParent { group_id: GroupId },

    #[error("Setting parent {parent_id} on group {group_id} would create a cycle")]
    Cycle { group_id: GroupId, parent_id: GroupId },

    #[error("Parent group with ID {parent_id} not found")]
    ParentNotFound { parent_id: GroupId },

    #[error("Cannot delete group with existing subgroups")]
    HasChildren { group_id: GroupId, children: i64 },
}

/// Snapshot of `id -> parent_id` for every stored group.
#[derive(Debug, Clone, Default)]
pub struct ParentIndex {
    parents: HashMap<GroupId, Option<GroupId>>,
}

impl ParentIndex {
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn contains(&self, id: GroupId) -> bool {
        self.parents.contains_key(&id)
    }

    /// Parent of `id`; `None` for roots and for unknown ids.
    pub fn parent_of(&self, id: GroupId) -> Option<GroupId> {
        self.parents.get(&id).copied().flatten()
    }
}

impl FromIterator<(GroupId, Option<GroupId>)> for ParentIndex {
    fn from_iter<I: IntoIterator<Item = (GroupId, Option<GroupId>)>>(iter: I) -> Self {
        Self {
            parents: iter.into_iter().collect(),
        }
    }
}

/// Check that `candidate` may become the parent of `group_id`.
///
/// `group_id` is `None` when the group does not exist yet (creation), in which case only the
/// existence of the parent is checked.
///
/// The ancestor walk is bounded by the number of stored groups, so a chain that is already
/// cyclic (corrupted data) terminates and is reported as a cycle.
pub fn validate_parent(index: &ParentIndex, group_id: Option<GroupId>, candidate: GroupId) -> Result<(), HierarchyViolation> {
    if group_id == Some(candidate) {
        return Err(HierarchyViolation::SelfParent { group_id: candidate });
    }

    if !index.contains(candidate) {
        return Err(HierarchyViolation::ParentNotFound { parent_id: candidate });
    }

    let Some(group_id) = group_id else {
        return Ok(());
    };

    let mut current = Some(candidate);
    for _ in 0..=index.len() {
        match current {
            None => return Ok(()),
            Some(ancestor) if ancestor == group_id => {
                return Err(HierarchyViolation::Cycle {
                    group_id,
                    parent_id: candidate,
                });
            }
            Some(ancestor) => current = index.parent_of(ancestor),
        }
    }

    tracing::warn!(group_id, parent_id = candidate, "ancestor walk exceeded group count, existing chain is cyclic");
    Err(HierarchyViolation::Cycle {
        group_id,
        parent_id: candidate,
    })
}

/// Only childless groups can be deleted.
pub fn validate_deletable(group_id: GroupId, children: i64) -> Result<(), HierarchyViolation> {
    if children > 0 {
        Err(HierarchyViolation::HasChildren { group_id, children })
    } else {
        Ok(())
    }
}

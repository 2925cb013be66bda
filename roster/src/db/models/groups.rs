//! Database models for groups.

use crate::types::GroupId;
use serde::{Deserialize, Serialize};

/// Database request for creating a new group
#[derive(Debug, Clone)]
pub struct GroupCreateDBRequest {
    pub name: String,
    pub parent_id: Option<GroupId>,
}

/// Database request for updating a group.
///
/// `parent_id` is tri-state: `None` leaves the parent untouched, `Some(None)` makes the group
/// a root and `Some(Some(id))` moves it under `id`.
#[derive(Debug, Clone, Default)]
pub struct GroupUpdateDBRequest {
    pub name: Option<String>,
    pub parent_id: Option<Option<GroupId>>,
}

/// Database response for a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDBResponse {
    pub id: GroupId,
    pub name: String,
    pub parent_id: Option<GroupId>,
}

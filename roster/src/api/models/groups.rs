//! API request/response models for groups.

use crate::db::models::groups::{GroupCreateDBRequest, GroupDBResponse, GroupUpdateDBRequest};
use crate::errors::Error;
use crate::types::GroupId;
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use utoipa::{IntoParams, ToSchema};

/// Query parameters for listing groups
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ListGroupsQuery {
    /// Case-insensitive substring filter on the group name. When set, the response is a flat
    /// list instead of the nested tree.
    pub query: Option<String>,
}

impl ListGroupsQuery {
    /// The filter, if one was given. An empty `query=` is treated as no filter.
    pub fn search(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.is_empty())
    }
}

/// Request body for creating a new group.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupCreate {
    /// Display name for the group
    #[schema(example = "Year 1")]
    pub name: String,
    /// Parent group; omit, `null` or `0` for a root group
    #[schema(example = 1)]
    #[serde(default)]
    pub parent_id: Option<GroupId>,
}

impl TryFrom<GroupCreate> for GroupCreateDBRequest {
    type Error = Error;

    fn try_from(create: GroupCreate) -> Result<Self, Self::Error> {
        Ok(Self {
            name: validate_name(create.name)?,
            parent_id: create.parent_id.filter(|id| *id != 0),
        })
    }
}

/// Request body for updating an existing group. All fields are optional;
/// only provided fields will be updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GroupUpdate {
    /// Must match the path ID when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<GroupId>,
    /// New display name (omit to keep unchanged)
    #[schema(example = "Year 1 - Updated")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New parent: omit to keep unchanged, `null` to make the group a root
    #[schema(value_type = Option<i64>, example = 1)]
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub parent_id: Option<Option<GroupId>>,
}

impl GroupUpdate {
    /// Validate against the group being updated and convert to a database request
    pub fn into_db_request(self, group_id: GroupId) -> Result<GroupUpdateDBRequest, Error> {
        if let Some(body_id) = self.id
            && body_id != group_id
        {
            return Err(Error::BadRequest {
                message: "ID in path and body must match".to_string(),
            });
        }

        Ok(GroupUpdateDBRequest {
            name: self.name.map(validate_name).transpose()?,
            parent_id: self.parent_id,
        })
    }
}

fn validate_name(name: String) -> Result<String, Error> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Unprocessable {
            message: "Group name must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// A single group, as returned by create/get/update and in the flat list view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GroupResponse {
    /// Unique identifier for the group
    pub id: GroupId,
    /// Display name for the group
    pub name: String,
    /// Parent group, `null` for roots
    pub parent_id: Option<GroupId>,
}

impl From<GroupDBResponse> for GroupResponse {
    fn from(db: GroupDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            parent_id: db.parent_id,
        }
    }
}

/// A group with its subgroups nested below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GroupTreeNode {
    pub id: GroupId,
    pub name: String,
    pub parent_id: Option<GroupId>,
    /// Direct subgroups, ordered by ID
    #[schema(no_recursion)]
    pub children: Vec<GroupTreeNode>,
}

impl GroupTreeNode {
    /// Number of groups in this subtree, including this one
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(GroupTreeNode::size).sum::<usize>()
    }
}

/// Response of `GET /groups`: the full forest, or a flat filtered list when `query` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum GroupsView {
    Tree(Vec<GroupTreeNode>),
    Flat(Vec<GroupResponse>),
}

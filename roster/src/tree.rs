//! Assembly of the `GET /groups` views from flat group rows.
//!
//! Groups are kept in an arena (a `Vec` ordered by id) and linked through a precomputed
//! `parent position -> child positions` table, so the nested view is built without pointer
//! cycles and in time linear in the number of groups.

use crate::api::models::groups::{GroupResponse, GroupTreeNode, GroupsView};
use crate::db::{fold_case, models::groups::GroupDBResponse};
use crate::types::GroupId;
use std::collections::HashMap;

/// Build the response for `GET /groups`.
///
/// With a non-empty `query` this is the flat view: groups whose name contains `query`
/// case-insensitively, ordered by id, without children. Otherwise it is the tree view of
/// every group.
pub fn assemble(groups: Vec<GroupDBResponse>, query: Option<&str>) -> GroupsView {
    match query.filter(|q| !q.is_empty()) {
        Some(query) => GroupsView::Flat(flatten(groups, query)),
        None => GroupsView::Tree(forest(groups)),
    }
}

fn flatten(mut groups: Vec<GroupDBResponse>, query: &str) -> Vec<GroupResponse> {
    let needle = fold_case(query);
    groups.retain(|group| fold_case(&group.name).contains(&needle));
    groups.sort_by_key(|group| group.id);
    groups.into_iter().map(GroupResponse::from).collect()
}

/// Nest every group under its parent.
///
/// Roots come first, ordered by id, and siblings are ordered by id. A group whose parent is
/// not in `groups` (an orphan) is placed at the top level. Groups caught in a parent cycle,
/// which no root can reach, are also placed at the top level, starting from the lowest id in
/// the cycle, so every group appears exactly once.
pub fn forest(mut groups: Vec<GroupDBResponse>) -> Vec<GroupTreeNode> {
    groups.sort_by_key(|group| group.id);
    let count = groups.len();

    let position: HashMap<GroupId, usize> = groups.iter().enumerate().map(|(i, group)| (group.id, i)).collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut top_level = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        match group.parent_id.and_then(|parent_id| position.get(&parent_id)) {
            Some(&parent) => children[parent].push(i),
            None => {
                if let Some(parent_id) = group.parent_id {
                    tracing::warn!(group_id = group.id, parent_id, "orphaned group placed at top level");
                }
                top_level.push(i);
            }
        }
    }

    // Pre-order walk: every group is listed after its ancestors
    let mut visited = vec![false; count];
    let mut order = Vec::with_capacity(count);
    let mut walk = |start: usize, visited: &mut Vec<bool>| {
        let mut stack = vec![start];
        visited[start] = true;
        while let Some(i) = stack.pop() {
            order.push(i);
            for &child in children[i].iter().rev() {
                if !visited[child] {
                    visited[child] = true;
                    stack.push(child);
                }
            }
        }
    };

    for &i in &top_level {
        walk(i, &mut visited);
    }
    for i in 0..count {
        if !visited[i] {
            tracing::warn!(group_id = groups[i].id, "group is part of a parent cycle, placed at top level");
            top_level.push(i);
            walk(i, &mut visited);
        }
    }

    // Build bottom-up, so each node's children are finished before the node itself
    let mut built: Vec<Option<GroupTreeNode>> = (0..count).map(|_| None).collect();
    let mut slots: Vec<Option<GroupDBResponse>> = groups.into_iter().map(Some).collect();
    for &i in order.iter().rev() {
        let Some(group) = slots[i].take() else { continue };
        let nested = children[i].iter().filter_map(|&child| built[child].take()).collect();
        built[i] = Some(GroupTreeNode {
            id: group.id,
            name: group.name,
            parent_id: group.parent_id,
            children: nested,
        });
    }

    top_level.into_iter().filter_map(|i| built[i].take()).collect()
}

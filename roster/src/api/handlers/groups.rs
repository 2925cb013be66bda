use crate::api::extract::{Json, Path, Query};
use crate::api::models::groups::{GroupCreate, GroupResponse, GroupUpdate, GroupsView, ListGroupsQuery};
use crate::db::{
    begin_serializable,
    errors::DbError,
    handlers::{Groups, Repository},
    models::groups::GroupCreateDBRequest,
};
use crate::errors::{Error, ErrorBody, Result};
use crate::{AppState, tree, types::GroupId};
use axum::{extract::State, http::StatusCode};

fn group_not_found(id: GroupId) -> Error {
    Error::NotFound {
        resource: "Group".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/groups",
    tag = "groups",
    summary = "List groups",
    description = "Without `query`, every group nested under its parent. With `query`, a flat list of the groups whose name contains it.",
    params(ListGroupsQuery),
    responses(
        (status = 200, description = "Group tree, or flat list when filtering", body = GroupsView),
        (status = 400, description = "Invalid query string", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_groups(State(state): State<AppState>, Query(query): Query<ListGroupsQuery>) -> Result<Json<GroupsView>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Groups::new(&mut conn);

    let groups = match query.search() {
        Some(search) => repo.list_by_name(search).await?,
        None => repo.list_all().await?,
    };

    Ok(Json(tree::assemble(groups, query.search())))
}

#[utoipa::path(
    post,
    path = "/groups",
    tag = "groups",
    summary = "Create group",
    request_body = GroupCreate,
    responses(
        (status = 201, description = "Group created successfully", body = GroupResponse),
        (status = 400, description = "Malformed request body", body = ErrorBody),
        (status = 404, description = "Parent group not found", body = ErrorBody),
        (status = 409, description = "Concurrent modification, retry", body = ErrorBody),
        (status = 422, description = "Invalid group data", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_group(State(state): State<AppState>, Json(create): Json<GroupCreate>) -> Result<(StatusCode, Json<GroupResponse>)> {
    let request = GroupCreateDBRequest::try_from(create)?;

    let mut tx = begin_serializable(&state.db).await?;
    let group = Groups::new(&mut tx).create(&request).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(group_id = group.id, parent_id = ?group.parent_id, "created group");
    Ok((StatusCode::CREATED, Json(GroupResponse::from(group))))
}

#[utoipa::path(
    get,
    path = "/groups/{group_id}",
    tag = "groups",
    summary = "Get group",
    params(
        ("group_id" = i64, Path, description = "Group ID"),
    ),
    responses(
        (status = 200, description = "Group details", body = GroupResponse),
        (status = 404, description = "Group not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_group(State(state): State<AppState>, Path(group_id): Path<GroupId>) -> Result<Json<GroupResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let group = Groups::new(&mut conn).get_by_id(group_id).await?.ok_or_else(|| group_not_found(group_id))?;

    Ok(Json(GroupResponse::from(group)))
}

#[utoipa::path(
    put,
    path = "/groups/{group_id}",
    tag = "groups",
    summary = "Update group",
    description = "Partial update. Omitted fields are kept; `parent_id: null` turns the group into a root.",
    request_body = GroupUpdate,
    params(
        ("group_id" = i64, Path, description = "Group ID"),
    ),
    responses(
        (status = 200, description = "Group updated successfully", body = GroupResponse),
        (status = 400, description = "Self-parenting, cycle, or body ID mismatch", body = ErrorBody),
        (status = 404, description = "Group or parent group not found", body = ErrorBody),
        (status = 409, description = "Concurrent modification, retry", body = ErrorBody),
        (status = 422, description = "Invalid group data", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_group(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    Json(update): Json<GroupUpdate>,
) -> Result<Json<GroupResponse>> {
    let request = update.into_db_request(group_id)?;

    let mut tx = begin_serializable(&state.db).await?;
    let group = match Groups::new(&mut tx).update(group_id, &request).await {
        Ok(group) => group,
        Err(DbError::NotFound) => return Err(group_not_found(group_id)),
        Err(e) => return Err(e.into()),
    };
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(GroupResponse::from(group)))
}

#[utoipa::path(
    delete,
    path = "/groups/{group_id}",
    tag = "groups",
    summary = "Delete group",
    description = "Only groups without subgroups or enrolled students can be deleted.",
    params(
        ("group_id" = i64, Path, description = "Group ID"),
    ),
    responses(
        (status = 204, description = "Group deleted successfully"),
        (status = 404, description = "Group not found", body = ErrorBody),
        (status = 409, description = "Group has subgroups or enrolled students", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_group(State(state): State<AppState>, Path(group_id): Path<GroupId>) -> Result<StatusCode> {
    let mut tx = begin_serializable(&state.db).await?;
    if !Groups::new(&mut tx).delete(group_id).await? {
        return Err(group_not_found(group_id));
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(group_id, "deleted group");
    Ok(StatusCode::NO_CONTENT)
}

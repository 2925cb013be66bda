use crate::api::extract::{Json, Path, Query};
use crate::api::models::students::{ListStudentsQuery, StudentCreate, StudentResponse};
use crate::db::{
    begin_serializable,
    handlers::{Repository, Students, students::StudentFilter},
    models::students::StudentCreateDBRequest,
};
use crate::errors::{Error, ErrorBody, Result};
use crate::{
    AppState,
    types::{GroupId, StudentId},
};
use axum::{extract::State, http::StatusCode};

fn student_not_found(id: StudentId) -> Error {
    Error::NotFound {
        resource: "Student".to_string(),
        id: id.to_string(),
    }
}

fn group_not_found(id: GroupId) -> Error {
    Error::NotFound {
        resource: "Group".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/students",
    tag = "students",
    summary = "List students",
    params(ListStudentsQuery),
    responses(
        (status = 200, description = "Students ordered by ID", body = Vec<StudentResponse>),
        (status = 400, description = "Invalid query string", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_students(
    State(state): State<AppState>,
    Query(query): Query<ListStudentsQuery>,
) -> Result<Json<Vec<StudentResponse>>> {
    let mut filter = StudentFilter::new();
    if let Some(search) = query.search() {
        filter = filter.with_search(search.to_string());
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let students = Students::new(&mut conn).list(&filter).await?;

    Ok(Json(students.into_iter().map(StudentResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/students",
    tag = "students",
    summary = "Create student",
    request_body = StudentCreate,
    responses(
        (status = 201, description = "Student created successfully", body = StudentResponse),
        (status = 400, description = "Malformed request body", body = ErrorBody),
        (status = 404, description = "Group not found", body = ErrorBody),
        (status = 422, description = "Invalid student data", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_student(
    State(state): State<AppState>,
    Json(create): Json<StudentCreate>,
) -> Result<(StatusCode, Json<StudentResponse>)> {
    let request = StudentCreateDBRequest::try_from(create)?;

    let mut tx = begin_serializable(&state.db).await?;
    let student = {
        let mut repo = Students::new(&mut tx);
        if !repo.group_exists(request.group_id).await? {
            return Err(group_not_found(request.group_id));
        }
        repo.create(&request).await?
    };
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(StudentResponse::from(student))))
}

#[utoipa::path(
    get,
    path = "/students/{student_id}",
    tag = "students",
    summary = "Get student",
    params(
        ("student_id" = i64, Path, description = "Student ID"),
    ),
    responses(
        (status = 200, description = "Student details", body = StudentResponse),
        (status = 404, description = "Student not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_student(State(state): State<AppState>, Path(student_id): Path<StudentId>) -> Result<Json<StudentResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let student = Students::new(&mut conn)
        .get_by_id(student_id)
        .await?
        .ok_or_else(|| student_not_found(student_id))?;

    Ok(Json(StudentResponse::from(student)))
}

#[utoipa::path(
    put,
    path = "/students/{student_id}",
    tag = "students",
    summary = "Replace student",
    request_body = StudentCreate,
    params(
        ("student_id" = i64, Path, description = "Student ID"),
    ),
    responses(
        (status = 200, description = "Student updated successfully", body = StudentResponse),
        (status = 400, description = "Malformed request body", body = ErrorBody),
        (status = 404, description = "Student or group not found", body = ErrorBody),
        (status = 422, description = "Invalid student data", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_student(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    Json(update): Json<StudentCreate>,
) -> Result<Json<StudentResponse>> {
    let request = StudentCreateDBRequest::try_from(update)?;

    let mut tx = begin_serializable(&state.db).await?;
    let student = {
        let mut repo = Students::new(&mut tx);
        if repo.get_by_id(student_id).await?.is_none() {
            return Err(student_not_found(student_id));
        }
        if !repo.group_exists(request.group_id).await? {
            return Err(group_not_found(request.group_id));
        }
        repo.update(student_id, &request).await?
    };
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(StudentResponse::from(student)))
}

#[utoipa::path(
    delete,
    path = "/students/{student_id}",
    tag = "students",
    summary = "Delete student",
    params(
        ("student_id" = i64, Path, description = "Student ID"),
    ),
    responses(
        (status = 204, description = "Student deleted successfully"),
        (status = 404, description = "Student not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_student(State(state): State<AppState>, Path(student_id): Path<StudentId>) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Students::new(&mut conn).delete(student_id).await? {
        return Err(student_not_found(student_id));
    }

    Ok(StatusCode::NO_CONTENT)
}

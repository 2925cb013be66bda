use crate::db::errors::DbError;
use crate::hierarchy::HierarchyViolation;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Malformed request or a request that breaks a business rule
    #[error("{message}")]
    BadRequest { message: String },

    /// Well-formed request whose content fails validation
    #[error("{message}")]
    Unprocessable { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),
}

/// Body of every error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human readable description of the failure
    #[schema(example = "Group with ID 999 not found")]
    pub detail: String,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DbError::SerializationFailure { .. } => StatusCode::CONFLICT,
                DbError::Hierarchy(violation) => match violation {
                    HierarchyViolation::SelfParent { .. } | HierarchyViolation::Cycle { .. } => StatusCode::BAD_REQUEST,
                    HierarchyViolation::ParentNotFound { .. } => StatusCode::NOT_FOUND,
                    HierarchyViolation::HasChildren { .. } => StatusCode::CONFLICT,
                },
                DbError::ProtectedEntity { .. } => StatusCode::CONFLICT,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } | Error::Unprocessable { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { table, .. } => match table.as_deref() {
                    Some("groups") => "Group name must not be empty".to_string(),
                    Some("students") => "Student name and email must not be empty".to_string(),
                    _ => "Invalid data provided".to_string(),
                },
                DbError::SerializationFailure { .. } => {
                    "The request conflicted with a concurrent change, please retry".to_string()
                }
                DbError::Hierarchy(violation) => violation.to_string(),
                DbError::ProtectedEntity {
                    operation,
                    entity_type,
                    reason,
                    ..
                } => format!("Cannot {operation} {entity_type}: {reason}"),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(DbError::NotFound) => {
                tracing::debug!("Client error: {}", self);
            }
            Error::Database(DbError::Hierarchy(_)) => {
                tracing::warn!("Conflict error: {}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::BadRequest { .. } | Error::Unprocessable { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = ErrorBody {
            detail: self.user_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Malformed JSON syntax and a missing content type are 400; a body that parses but does not
/// fit the schema is 422.
impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        match rejection.status() {
            StatusCode::UNPROCESSABLE_ENTITY => Error::Unprocessable { message },
            _ => Error::BadRequest { message },
        }
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::BadRequest {
            message: rejection.body_text(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Operation;

    #[test]
    fn test_hierarchy_violations_map_to_expected_status() {
        let cases = [
            (HierarchyViolation::SelfParent { group_id: 1 }, StatusCode::BAD_REQUEST),
            (HierarchyViolation::Cycle { group_id: 1, parent_id: 2 }, StatusCode::BAD_REQUEST),
            (HierarchyViolation::ParentNotFound { parent_id: 999 }, StatusCode::NOT_FOUND),
            (HierarchyViolation::HasChildren { group_id: 1, children: 2 }, StatusCode::CONFLICT),
        ];

        for (violation, status) in cases {
            let error = Error::Database(DbError::Hierarchy(violation));
            assert_eq!(error.status_code(), status);
        }
    }

    #[test]
    fn test_internal_details_do_not_leak() {
        let error = Error::Database(DbError::Other(anyhow::anyhow!("connection refused on 10.0.0.5")));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.user_message(), "Database error occurred");

        let error = Error::Database(DbError::SerializationFailure {
            message: "could not serialize access due to read/write dependencies".to_string(),
        });
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
        assert!(!error.user_message().contains("read/write"));
    }

    #[test]
    fn test_protected_entity_message() {
        let error = Error::Database(DbError::ProtectedEntity {
            operation: Operation::Delete,
            reason: "group still has enrolled students".to_string(),
            entity_type: "group".to_string(),
            entity_id: Some("4".to_string()),
        });
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
        assert_eq!(error.user_message(), "Cannot delete group: group still has enrolled students");
    }

    #[tokio::test]
    async fn test_response_body_is_detail() {
        let response = Error::NotFound {
            resource: "Group".to_string(),
            id: "7".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({ "detail": "Group with ID 7 not found" }));
    }
}

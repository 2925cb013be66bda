//! API request/response models for students.

use crate::db::models::students::{StudentCreateDBRequest, StudentDBResponse};
use crate::errors::Error;
use crate::types::{GroupId, StudentId};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for listing students
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ListStudentsQuery {
    /// Case-insensitive substring matched against the student's name or their group's name
    pub query: Option<String>,
}

impl ListStudentsQuery {
    pub fn search(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.is_empty())
    }
}

/// Request body for creating or replacing a student
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentCreate {
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    /// Group the student is enrolled in; must exist
    #[schema(example = 1)]
    pub group_id: GroupId,
}

impl TryFrom<StudentCreate> for StudentCreateDBRequest {
    type Error = Error;

    fn try_from(create: StudentCreate) -> Result<Self, Self::Error> {
        let name = create.name.trim();
        if name.is_empty() {
            return Err(Error::Unprocessable {
                message: "Student name must not be empty".to_string(),
            });
        }
        let email = create.email.trim();
        if email.is_empty() {
            return Err(Error::Unprocessable {
                message: "Student email must not be empty".to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            email: email.to_string(),
            group_id: create.group_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StudentResponse {
    pub id: StudentId,
    pub name: String,
    pub email: String,
    pub group_id: GroupId,
}

impl From<StudentDBResponse> for StudentResponse {
    fn from(db: StudentDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            email: db.email,
            group_id: db.group_id,
        }
    }
}

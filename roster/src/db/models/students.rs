//! Database models for students.

use crate::types::{GroupId, StudentId};
use serde::{Deserialize, Serialize};

/// Database request for creating a new student
#[derive(Debug, Clone)]
pub struct StudentCreateDBRequest {
    pub name: String,
    pub email: String,
    pub group_id: GroupId,
}

/// Students are replaced wholesale on update
pub type StudentUpdateDBRequest = StudentCreateDBRequest;

/// Database response for a student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentDBResponse {
    pub id: StudentId,
    pub name: String,
    pub email: String,
    pub group_id: GroupId,
}

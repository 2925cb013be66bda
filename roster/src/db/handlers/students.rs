//! Database repository for students.

use crate::db::{
    contains_pattern,
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::students::{StudentCreateDBRequest, StudentDBResponse, StudentUpdateDBRequest},
};
use crate::types::{GroupId, StudentId};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

/// Filter for listing students
#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub search: Option<String>, // Case-insensitive substring search on student or group name
}

impl StudentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: String) -> Self {
        self.search = Some(search);
        self
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Student {
    pub id: StudentId,
    pub name: String,
    pub email: String,
    pub group_id: GroupId,
}

impl From<Student> for StudentDBResponse {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            name: student.name,
            email: student.email,
            group_id: student.group_id,
        }
    }
}

pub struct Students<'c> {
    db: &'c mut PgConnection,
}

/// A missing group surfaces as a foreign key violation on `group_id`
fn map_group_reference(err: sqlx::Error) -> DbError {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => DbError::NotFound,
        e => DbError::from(e),
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Students<'c> {
    type CreateRequest = StudentCreateDBRequest;
    type UpdateRequest = StudentUpdateDBRequest;
    type Response = StudentDBResponse;
    type Id = StudentId;
    type Filter = StudentFilter;

    #[instrument(skip(self, request), fields(group_id = request.group_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let student = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (name, email, group_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, group_id
            "#,
        )
        .bind(&request.name)
        .bind(&request.email)
        .bind(request.group_id)
        .fetch_one(&mut *self.db)
        .await
        .map_err(map_group_reference)?;

        Ok(StudentDBResponse::from(student))
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let student = sqlx::query_as::<_, Student>("SELECT id, name, email, group_id FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(student.map(StudentDBResponse::from))
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace every field of a student
    #[instrument(skip(self, request), fields(group_id = request.group_id), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let student = sqlx::query_as::<_, Student>(
            r#"
            UPDATE students SET
                name = $2,
                email = $3,
                group_id = $4
            WHERE id = $1
            RETURNING id, name, email, group_id
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.email)
        .bind(request.group_id)
        .fetch_optional(&mut *self.db)
        .await
        .map_err(map_group_reference)?
        .ok_or(DbError::NotFound)?;

        Ok(StudentDBResponse::from(student))
    }

    #[instrument(skip(self, filter), fields(search = ?filter.search), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        use sqlx::QueryBuilder;

        let mut query = QueryBuilder::new(
            "SELECT s.id, s.name, s.email, s.group_id FROM students s INNER JOIN groups g ON g.id = s.group_id WHERE 1=1",
        );

        // Match either the student's own name or the name of their group
        if let Some(ref search) = filter.search {
            let pattern = contains_pattern(search);
            query.push(" AND (LOWER(s.name) LIKE ");
            query.push_bind(pattern.clone());
            query.push(" ESCAPE '\\' OR LOWER(g.name) LIKE ");
            query.push_bind(pattern);
            query.push(" ESCAPE '\\')");
        }

        query.push(" ORDER BY s.id");

        let students = query.build_query_as::<Student>().fetch_all(&mut *self.db).await?;

        tracing::debug!("Retrieved {} students", students.len());

        Ok(students.into_iter().map(StudentDBResponse::from).collect())
    }
}

impl<'c> Students<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Whether the group a student points at exists
    #[instrument(skip(self), err)]
    pub async fn group_exists(&mut self, group_id: GroupId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM groups WHERE id = $1)")
            .bind(group_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{handlers::Groups, models::groups::GroupCreateDBRequest};
    use sqlx::PgPool;

    async fn create_group(conn: &mut PgConnection, name: &str) -> GroupId {
        Groups::new(conn)
            .create(&GroupCreateDBRequest {
                name: name.to_string(),
                parent_id: None,
            })
            .await
            .expect("Failed to create group")
            .id
    }

    fn student(name: &str, group_id: GroupId) -> StudentCreateDBRequest {
        StudentCreateDBRequest {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            group_id,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_student_crud(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let physics = create_group(&mut conn, "Physics").await;
        let chemistry = create_group(&mut conn, "Chemistry").await;

        let mut repo = Students::new(&mut conn);
        let created = repo.create(&student("Ada", physics)).await.unwrap();
        assert_eq!(created.group_id, physics);
        assert_eq!(created.email, "ada@example.com");

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);

        let updated = repo.update(created.id, &student("Grace", chemistry)).await.unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Grace");
        assert_eq!(updated.group_id, chemistry);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_student_with_missing_group(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Students::new(&mut conn);

        assert!(!repo.group_exists(999).await.unwrap());
        let result = repo.create(&student("Ada", 999)).await;
        assert!(matches!(result, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_missing_student(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let group = create_group(&mut conn, "Physics").await;

        let mut repo = Students::new(&mut conn);
        let result = repo.update(12345, &student("Ada", group)).await;
        assert!(matches!(result, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_search_matches_student_or_group_name(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let physics = create_group(&mut conn, "Physics").await;
        let history = create_group(&mut conn, "History").await;

        let mut repo = Students::new(&mut conn);
        let ada = repo.create(&student("Ada", physics)).await.unwrap();
        let grace = repo.create(&student("Grace", history)).await.unwrap();
        let phil = repo.create(&student("Phil", history)).await.unwrap();

        let by_group = repo.list(&StudentFilter::new().with_search("PHYS".to_string())).await.unwrap();
        assert_eq!(by_group, vec![ada.clone()]);

        let by_name = repo.list(&StudentFilter::new().with_search("ph".to_string())).await.unwrap();
        assert_eq!(by_name, vec![ada.clone(), phil.clone()]);

        let all = repo.list(&StudentFilter::new()).await.unwrap();
        assert_eq!(all, vec![ada, grace, phil]);
    }
}

//! Database repository for the group hierarchy.

use crate::db::{
    contains_pattern,
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::groups::{GroupCreateDBRequest, GroupDBResponse, GroupUpdateDBRequest},
};
use crate::hierarchy::{self, ParentIndex};
use crate::types::{GroupId, Operation};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

/// Filter for listing groups
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    pub search: Option<String>, // Case-insensitive substring search on name
}

impl GroupFilter {
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
struct Group {
    pub id: GroupId,
    pub name: String,
    pub parent_id: Option<GroupId>,
}

impl From<Group> for GroupDBResponse {
    fn from(group: Group) -> Self {
        Self {
            id: group.id,
            name: group.name,
            parent_id: group.parent_id,
        }
    }
}

#[derive(Debug, FromRow)]
struct ParentLink {
    id: GroupId,
    parent_id: Option<GroupId>,
}

pub struct Groups<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Groups<'c> {
    type CreateRequest = GroupCreateDBRequest;
    type UpdateRequest = GroupUpdateDBRequest;
    type Response = GroupDBResponse;
    type Id = GroupId;
    type Filter = GroupFilter;

    #[instrument(skip(self, request), fields(name = %request.name, parent_id = ?request.parent_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        if let Some(parent_id) = request.parent_id {
            let ancestry = self.ancestry(parent_id).await?;
            hierarchy::validate_parent(&ancestry, None, parent_id)?;
        }

        let group = sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO groups (name, parent_id)
            VALUES ($1, $2)
            RETURNING id, name, parent_id
            "#,
        )
        .bind(&request.name)
        .bind(request.parent_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(GroupDBResponse::from(group))
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let group = sqlx::query_as::<_, Group>("SELECT id, name, parent_id FROM groups WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(group.map(GroupDBResponse::from))
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        if !self.lock(id).await? {
            return Ok(false);
        }

        let children = self.child_count(id).await?;
        hierarchy::validate_deletable(id, children)?;

        match sqlx::query("DELETE FROM groups WHERE id = $1").bind(id).execute(&mut *self.db).await {
            Ok(result) => Ok(result.rows_affected() > 0),
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                // Children were ruled out above, so the remaining references are students
                Err(DbError::ProtectedEntity {
                    operation: Operation::Delete,
                    reason: "group still has enrolled students".to_string(),
                    entity_type: "Group".to_string(),
                    entity_id: Some(id.to_string()),
                })
            }
            Err(e) => Err(DbError::from(e)),
        }
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        if !self.lock(id).await? {
            return Err(DbError::NotFound);
        }

        if let Some(Some(parent_id)) = request.parent_id {
            let ancestry = self.ancestry(parent_id).await?;
            hierarchy::validate_parent(&ancestry, Some(id), parent_id)?;
        }

        // $3 says whether parent_id is part of the patch, since NULL is a valid new parent
        let group = sqlx::query_as::<_, Group>(
            r#"
            UPDATE groups SET
                name = COALESCE($2, name),
                parent_id = CASE WHEN $3 THEN $4 ELSE parent_id END
            WHERE id = $1
            RETURNING id, name, parent_id
            "#,
        )
        .bind(id)
        .bind(request.name.as_deref())
        .bind(request.parent_id.is_some())
        .bind(request.parent_id.flatten())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(GroupDBResponse::from(group))
    }

    #[instrument(skip(self, filter), fields(search = ?filter.search), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        use sqlx::QueryBuilder;

        let mut query = QueryBuilder::new("SELECT id, name, parent_id FROM groups WHERE 1=1");

        if let Some(ref search) = filter.search {
            query.push(" AND LOWER(name) LIKE ");
            query.push_bind(contains_pattern(search));
            query.push(" ESCAPE '\\'");
        }

        query.push(" ORDER BY id");

        let groups = query.build_query_as::<Group>().fetch_all(&mut *self.db).await?;

        tracing::debug!("Retrieved {} groups", groups.len());

        Ok(groups.into_iter().map(GroupDBResponse::from).collect())
    }
}

impl<'c> Groups<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Every group, ordered by id
    pub async fn list_all(&mut self) -> Result<Vec<GroupDBResponse>> {
        self.list(&GroupFilter::new()).await
    }

    /// Groups whose name contains `query`, case-insensitively
    pub async fn list_by_name(&mut self, query: &str) -> Result<Vec<GroupDBResponse>> {
        self.list(&GroupFilter::new().with_search(query.to_string())).await
    }

    /// Number of direct children of a group
    #[instrument(skip(self), err)]
    pub async fn child_count(&mut self, id: GroupId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM groups WHERE parent_id = $1")
            .bind(id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Load `id` and its ancestor chain as a [`ParentIndex`].
    ///
    /// The recursive walk stops after as many steps as there are groups, so it terminates even
    /// when the stored chain is already cyclic. An unknown `id` yields an empty index.
    #[instrument(skip(self), err)]
    pub async fn ancestry(&mut self, id: GroupId) -> Result<ParentIndex> {
        let links = sqlx::query_as::<_, ParentLink>(
            r#"
            WITH RECURSIVE ancestors (id, parent_id, depth) AS (
                SELECT id, parent_id, 0
                FROM groups
                WHERE id = $1
                UNION ALL
                SELECT g.id, g.parent_id, a.depth + 1
                FROM groups g
                INNER JOIN ancestors a ON g.id = a.parent_id
                WHERE a.depth < (SELECT COUNT(*) FROM groups)
            )
            SELECT id, parent_id FROM ancestors
            "#,
        )
        .bind(id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(links.into_iter().map(|link| (link.id, link.parent_id)).collect())
    }

    /// Lock a group row for the rest of the transaction, returning whether it exists
    async fn lock(&mut self, id: GroupId) -> Result<bool> {
        let row: Option<GroupId> = sqlx::query_scalar("SELECT id FROM groups WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{begin_serializable, handlers::Students, models::students::StudentCreateDBRequest};
    use crate::hierarchy::HierarchyViolation;
    use sqlx::PgPool;

    async fn create_group(repo: &mut Groups<'_>, name: &str, parent_id: Option<GroupId>) -> GroupDBResponse {
        repo.create(&GroupCreateDBRequest {
            name: name.to_string(),
            parent_id,
        })
        .await
        .expect("Failed to create group")
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_get_group(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Groups::new(&mut conn);

        let root = create_group(&mut repo, "Root", None).await;
        let child = create_group(&mut repo, "Child", Some(root.id)).await;

        assert_eq!(root.parent_id, None);
        assert_eq!(child.parent_id, Some(root.id));

        let fetched = repo.get_by_id(child.id).await.unwrap().expect("group should exist");
        assert_eq!(fetched, child);

        assert!(repo.get_by_id(child.id + 1000).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_with_missing_parent(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Groups::new(&mut conn);

        let result = repo
            .create(&GroupCreateDBRequest {
                name: "X".to_string(),
                parent_id: Some(999),
            })
            .await;

        assert!(matches!(
            result,
            Err(DbError::Hierarchy(HierarchyViolation::ParentNotFound { parent_id: 999 }))
        ));
        assert!(repo.list_all().await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_by_name_is_case_insensitive(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Groups::new(&mut conn);

        let math = create_group(&mut repo, "Mathematics", None).await;
        let applied = create_group(&mut repo, "Applied MATH", Some(math.id)).await;
        create_group(&mut repo, "History", None).await;
        create_group(&mut repo, "100% Pass", None).await;

        let found = repo.list_by_name("math").await.unwrap();
        assert_eq!(found.iter().map(|g| g.id).collect::<Vec<_>>(), vec![math.id, applied.id]);

        // Wildcards in the query match literally
        let found = repo.list_by_name("%").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "100% Pass");

        assert!(repo.list_by_name("physics").await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_name_keeps_parent(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Groups::new(&mut conn);

        let root = create_group(&mut repo, "Root", None).await;
        let child = create_group(&mut repo, "Child", Some(root.id)).await;

        let updated = repo
            .update(
                child.id,
                &GroupUpdateDBRequest {
                    name: Some("Renamed".to_string()),
                    parent_id: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.parent_id, Some(root.id));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_to_root_and_back(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Groups::new(&mut conn);

        let root = create_group(&mut repo, "Root", None).await;
        let child = create_group(&mut repo, "Child", Some(root.id)).await;

        let detached = repo
            .update(
                child.id,
                &GroupUpdateDBRequest {
                    name: None,
                    parent_id: Some(None),
                },
            )
            .await
            .unwrap();
        assert_eq!(detached.parent_id, None);
        assert_eq!(detached.name, "Child");

        let reattached = repo
            .update(
                child.id,
                &GroupUpdateDBRequest {
                    name: None,
                    parent_id: Some(Some(root.id)),
                },
            )
            .await
            .unwrap();
        assert_eq!(reattached.parent_id, Some(root.id));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_rejects_self_parent_and_cycles(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Groups::new(&mut conn);

        let a = create_group(&mut repo, "A", None).await;
        let b = create_group(&mut repo, "B", Some(a.id)).await;
        let c = create_group(&mut repo, "C", Some(b.id)).await;

        let self_parent = repo
            .update(
                a.id,
                &GroupUpdateDBRequest {
                    name: None,
                    parent_id: Some(Some(a.id)),
                },
            )
            .await;
        assert!(matches!(self_parent, Err(DbError::Hierarchy(HierarchyViolation::SelfParent { .. }))));

        let cycle = repo
            .update(
                a.id,
                &GroupUpdateDBRequest {
                    name: Some("ignored".to_string()),
                    parent_id: Some(Some(c.id)),
                },
            )
            .await;
        assert!(matches!(cycle, Err(DbError::Hierarchy(HierarchyViolation::Cycle { .. }))));

        // Nothing changed
        let a_after = repo.get_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(a_after, a);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_unknown_group(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Groups::new(&mut conn);

        let result = repo
            .update(
                42,
                &GroupUpdateDBRequest {
                    name: Some("Nope".to_string()),
                    parent_id: None,
                },
            )
            .await;
        assert!(matches!(result, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_ancestry(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Groups::new(&mut conn);

        let a = create_group(&mut repo, "A", None).await;
        let b = create_group(&mut repo, "B", Some(a.id)).await;
        let c = create_group(&mut repo, "C", Some(b.id)).await;
        create_group(&mut repo, "Unrelated", None).await;

        let ancestry = repo.ancestry(c.id).await.unwrap();
        assert_eq!(ancestry.len(), 3);
        assert_eq!(ancestry.parent_of(c.id), Some(b.id));
        assert_eq!(ancestry.parent_of(b.id), Some(a.id));
        assert_eq!(ancestry.parent_of(a.id), None);

        assert!(repo.ancestry(9999).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_ancestry_terminates_on_corrupted_chain(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Groups::new(&mut conn);

        let a = create_group(&mut repo, "A", None).await;
        let b = create_group(&mut repo, "B", Some(a.id)).await;
        // Bypass the repository to corrupt the chain into a loop
        sqlx::query("UPDATE groups SET parent_id = $1 WHERE id = $2")
            .bind(b.id)
            .bind(a.id)
            .execute(&mut *repo.db)
            .await
            .unwrap();
        let outsider = create_group(&mut repo, "Outsider", None).await;

        let ancestry = repo.ancestry(a.id).await.unwrap();
        assert_eq!(ancestry.len(), 2);

        let result = repo
            .update(
                outsider.id,
                &GroupUpdateDBRequest {
                    name: None,
                    parent_id: Some(Some(a.id)),
                },
            )
            .await;
        assert!(matches!(result, Err(DbError::Hierarchy(HierarchyViolation::Cycle { .. }))));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_leaf_only(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Groups::new(&mut conn);

        let root = create_group(&mut repo, "Root", None).await;
        let child = create_group(&mut repo, "Child", Some(root.id)).await;

        let blocked = repo.delete(root.id).await;
        assert!(matches!(
            blocked,
            Err(DbError::Hierarchy(HierarchyViolation::HasChildren { children: 1, .. }))
        ));
        assert_eq!(repo.list_all().await.unwrap().len(), 2);

        assert!(repo.delete(child.id).await.unwrap());
        assert!(repo.delete(root.id).await.unwrap());
        assert!(!repo.delete(root.id).await.unwrap());
        assert!(repo.list_all().await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_group_with_students_is_protected(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let group = {
            let mut repo = Groups::new(&mut conn);
            create_group(&mut repo, "Class", None).await
        };

        {
            let mut students = Students::new(&mut conn);
            students
                .create(&StudentCreateDBRequest {
                    name: "Ada".to_string(),
                    email: "ada@example.com".to_string(),
                    group_id: group.id,
                })
                .await
                .unwrap();
        }

        let mut repo = Groups::new(&mut conn);
        let result = repo.delete(group.id).await;
        assert!(matches!(
            result,
            Err(DbError::ProtectedEntity {
                operation: Operation::Delete,
                ..
            })
        ));
        assert!(repo.get_by_id(group.id).await.unwrap().is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_concurrent_reparenting_cannot_form_cycle(pool: PgPool) {
        let (a, b) = {
            let mut conn = pool.acquire().await.unwrap();
            let mut repo = Groups::new(&mut conn);
            (create_group(&mut repo, "A", None).await, create_group(&mut repo, "B", None).await)
        };

        let under = |parent_id: GroupId| GroupUpdateDBRequest {
            name: None,
            parent_id: Some(Some(parent_id)),
        };

        // Each transaction validates against a hierarchy where both groups are roots
        let mut first = begin_serializable(&pool).await.unwrap();
        Groups::new(&mut first).update(a.id, &under(b.id)).await.unwrap();

        let mut second = begin_serializable(&pool).await.unwrap();
        let second_update = Groups::new(&mut second).update(b.id, &under(a.id)).await;

        first.commit().await.unwrap();

        let second_result = match second_update {
            Ok(_) => second.commit().await.map_err(DbError::from),
            Err(e) => Err(e),
        };
        assert!(
            matches!(second_result, Err(DbError::SerializationFailure { .. })),
            "expected serialization failure, got {second_result:?}"
        );

        let mut conn = pool.acquire().await.unwrap();
        let groups = Groups::new(&mut conn).list_all().await.unwrap();
        assert!(groups.iter().any(|g| g.parent_id.is_none()));
        assert_eq!(groups.iter().find(|g| g.id == a.id).unwrap().parent_id, Some(b.id));
        assert_eq!(groups.iter().find(|g| g.id == b.id).unwrap().parent_id, None);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_child_count(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Groups::new(&mut conn);

        let root = create_group(&mut repo, "Root", None).await;
        create_group(&mut repo, "One", Some(root.id)).await;
        let two = create_group(&mut repo, "Two", Some(root.id)).await;
        create_group(&mut repo, "Grandchild", Some(two.id)).await;

        assert_eq!(repo.child_count(root.id).await.unwrap(), 2);
        assert_eq!(repo.child_count(two.id).await.unwrap(), 1);
    }
}

//! OpenAPI documentation for the HTTP API.
//!
//! The document is served raw at `/api-docs/openapi.json` and rendered with Scalar at `/docs`.

use crate::api;
use crate::errors::ErrorBody;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Roster API",
        description = "Students and the hierarchy of groups they are enrolled in."
    ),
    paths(
        api::handlers::groups::list_groups,
        api::handlers::groups::create_group,
        api::handlers::groups::get_group,
        api::handlers::groups::update_group,
        api::handlers::groups::delete_group,
        api::handlers::students::list_students,
        api::handlers::students::create_student,
        api::handlers::students::get_student,
        api::handlers::students::update_student,
        api::handlers::students::delete_student,
    ),
    components(
        schemas(
            api::models::groups::GroupCreate,
            api::models::groups::GroupUpdate,
            api::models::groups::GroupResponse,
            api::models::groups::GroupTreeNode,
            api::models::groups::GroupsView,
            api::models::students::StudentCreate,
            api::models::students::StudentResponse,
            ErrorBody,
        )
    ),
    tags(
        (name = "groups", description = "Group hierarchy. A group may have a parent group; groups with subgroups or enrolled students cannot be deleted."),
        (name = "students", description = "Students, each enrolled in exactly one group."),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["/groups", "/groups/{group_id}", "/students", "/students/{student_id}"]);

        let json = doc.to_json().expect("document should serialize");
        assert!(json.contains("GroupTreeNode"));
        assert!(json.contains("ErrorBody"));
    }
}

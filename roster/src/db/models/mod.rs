//! Database record models matching table schemas.
//!
//! These models are what repositories accept and return. They are distinct from the API
//! models in [`crate::api::models`] so that storage and wire representations can evolve
//! independently; conversions live on the API side (`From<GroupDBResponse> for GroupResponse`).
//!
//! - [`groups`]: Group hierarchy records
//! - [`students`]: Student records

pub mod groups;
pub mod students;

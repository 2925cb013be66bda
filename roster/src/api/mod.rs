//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//! - **[`extract`]**: Extractors that report rejections as `{"detail": ...}` errors
//!
//! # API Structure
//!
//! - **Groups** (`/groups/*`): Group hierarchy, as a tree or a filtered flat list
//! - **Students** (`/students/*`): Students enrolled in groups
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa`. Interactive documentation is served at `/docs`.

pub mod extract;
pub mod handlers;
pub mod models;

//! HTTP request handlers for all API endpoints.
//!
//! Each handler validates and converts its typed request body, takes a connection or
//! transaction from the pool and delegates to a repository in [`crate::db::handlers`]:
//!
//! - reads are single statements on a plain pool connection
//! - writes run in a SERIALIZABLE transaction via [`crate::db::begin_serializable`]
//!
//! # Handler Modules
//!
//! - [`groups`]: Group hierarchy CRUD and the tree/flat listing
//! - [`students`]: Student CRUD and search
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Result`]; every error renders as `{"detail": "..."}` with
//! the status code chosen by [`crate::errors::Error::status_code`].

pub mod groups;
pub mod students;

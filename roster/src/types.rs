//! Common type definitions.
//!
//! # ID Types
//!
//! Entity IDs are store-assigned `BIGSERIAL` values wrapped in type aliases:
//!
//! - [`GroupId`]: Group identifier
//! - [`StudentId`]: Student identifier

use serde::Serialize;
use std::fmt;

// Type aliases for IDs
pub type GroupId = i64;
pub type StudentId = i64;

/// Operations that can be refused on an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Delete => write!(f, "delete"),
        }
    }
}

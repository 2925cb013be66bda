//! Repository implementations for database access.
//!
//! Each repository:
//! - Wraps a SQLx connection or transaction
//! - Provides strongly-typed CRUD operations
//! - Handles query construction and parameter binding
//! - Returns records from [`crate::db::models`]
//!
//! # Available Repositories
//!
//! - [`Groups`]: Group hierarchy, validated against [`crate::hierarchy`] before every write
//! - [`Students`]: Student records
//!
//! # Common Pattern
//!
//! ```ignore
//! use roster::db::handlers::{Groups, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = roster::db::begin_serializable(pool).await?;
//!     let mut repo = Groups::new(&mut tx);
//!
//!     let groups = repo.list_all().await?;
//!
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod groups;
pub mod repository;
pub mod students;

pub use groups::Groups;
pub use repository::Repository;
pub use students::Students;

//! Database layer for data persistence and access.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries, hierarchy validation)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Transactions
//!
//! Repositories borrow a connection. Reads get a plain pool connection; writes get a transaction.
//! Writes use [`begin_serializable`] so that the validate-then-write sequence in
//! [`handlers::Groups`] cannot interleave with a concurrent reparenting into a cycle: one
//! of the two transactions fails with [`errors::DbError::SerializationFailure`].
//!
//! # Migrations
//!
//! Migrations live in `roster/migrations` and run at startup through [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;

use sqlx::{PgPool, Postgres, Transaction};

/// Begin a transaction at SERIALIZABLE isolation
pub async fn begin_serializable(pool: &PgPool) -> errors::Result<Transaction<'static, Postgres>> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE").execute(&mut *tx).await?;
    Ok(tx)
}

/// Lowercase `s` one character at a time, the way Postgres `LOWER` does.
///
/// `str::to_lowercase` maps a word-final `Σ` to `ς`, so a name and a query lowered with it can
/// disagree on the same letter.
pub(crate) fn fold_case(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}

/// Build a `LIKE` pattern matching `search` as a case-insensitive substring.
///
/// The pattern is case-folded to be compared against `LOWER(column)`, and `LIKE` wildcards in
/// the input are escaped so they match literally (use with `ESCAPE '\'`).
pub(crate) fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for ch in fold_case(search).chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

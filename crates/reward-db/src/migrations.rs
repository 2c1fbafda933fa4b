//! Database migration system.
//!
//! Schema version stored in `PRAGMA user_version`. Migrations are forward-only.

use std::cmp::Ordering;

use rusqlite::Connection;

use crate::{schema, DbError, Result, SCHEMA_VERSION};

fn user_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring the database up to [`SCHEMA_VERSION`].
///
/// A fresh database gets the full schema in one transaction. A database
/// written by a newer release is refused rather than touched.
pub fn run(conn: &Connection) -> Result<()> {
    let current = user_version(conn)?;

    match current.cmp(&SCHEMA_VERSION) {
        Ordering::Equal => Ok(()),
        Ordering::Greater => Err(DbError::Migration(format!(
            "rewarding database is at v{current}, this build supports up to v{SCHEMA_VERSION}"
        ))),
        Ordering::Less if current == 0 => {
            tracing::info!(version = SCHEMA_VERSION, "creating rewarding schema");
            conn.execute_batch(&format!(
                "BEGIN; {} PRAGMA user_version = {SCHEMA_VERSION}; COMMIT;",
                schema::SCHEMA_V1
            ))?;
            Ok(())
        }
        Ordering::Less => {
            for version in (current + 1)..=SCHEMA_VERSION {
                tracing::info!(from = version - 1, to = version, "migrating rewarding schema");
                upgrade_to(conn, version)?;
                conn.pragma_update(None, "user_version", version)?;
            }
            Ok(())
        }
    }
}

/// Apply the step that lifts the schema to `version`.
fn upgrade_to(_conn: &Connection, version: u32) -> Result<()> {
    Err(DbError::Migration(format!("no upgrade path to v{version}")))
}

//! Schema migration system.
//!
//! Migrations are stored as static SQL strings keyed by version number.
//! The current version lives in a single-row `schema_version` table and
//! each step is applied inside its own transaction, so a crash mid-upgrade
//! leaves the database at a consistent intermediate version. Opening a
//! database whose persisted version is newer than the latest migration
//! known to this build is an error.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// A single migration definition.
struct Migration {
    /// Monotonically increasing version number (1, 2, 3, ...).
    version: u32,
    /// Human-readable description.
    description: &'static str,
    /// Raw SQL to execute. May contain multiple statements separated by `;`.
    sql: &'static str,
}

/// All migrations in order. Add new migrations to the end of this array.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "initial schema — sessions and events",
    sql: r#"
        CREATE TABLE sessions (
            session_id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            metadata   TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE events (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
            event_id   TEXT NOT NULL UNIQUE,
            turn_id    TEXT NOT NULL,
            event_type TEXT NOT NULL,
            timestamp  TEXT NOT NULL,
            payload    TEXT NOT NULL
        );
        CREATE INDEX idx_events_session ON events(session_id);
        CREATE INDEX idx_events_turn ON events(turn_id);
    "#,
}];

/// The schema version produced by the newest migration.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Run all pending migrations against `conn`.
///
/// This is a **synchronous** function — call it from `spawn_blocking`.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    ensure_version_table(conn)?;

    let current = current_version(conn)?;
    let target = latest_version();

    if current > target {
        return Err(StoreError::FutureSchema {
            found: current,
            supported: target,
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        debug!(current_version = current, "event store schema is up to date");
        return Ok(());
    }

    info!(
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        apply(conn, migration)?;
    }

    Ok(())
}

/// Return the current schema version, or 0 if not initialised.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    let exists: bool = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get::<_, i64>(0).map(|n| n > 0),
    )?;
    if !exists {
        return Ok(0);
    }

    let version: Option<u32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    Ok(version.unwrap_or(0))
}

// ── internals ────────────────────────────────────────────────────────

fn ensure_version_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;
    Ok(())
}

fn set_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    let rows: i64 = conn.query_row("SELECT count(*) FROM schema_version", [], |row| row.get(0))?;
    if rows == 0 {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    } else {
        conn.execute("UPDATE schema_version SET version = ?1", [version])?;
    }
    Ok(())
}

/// Apply a single migration inside a transaction.
fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
    );

    conn.execute_batch("BEGIN IMMEDIATE;")
        .map_err(|e| StoreError::Migration {
            version: migration.version,
            message: format!("failed to begin transaction: {e}"),
        })?;

    let result = (|| -> StoreResult<()> {
        conn.execute_batch(migration.sql)
            .map_err(|e| StoreError::Migration {
                version: migration.version,
                message: format!("SQL execution failed: {e}"),
            })?;
        set_version(conn, migration.version).map_err(|e| StoreError::Migration {
            version: migration.version,
            message: format!("failed to record version: {e}"),
        })?;
        Ok(())
    })();

    match &result {
        Ok(()) => {
            conn.execute_batch("COMMIT;")
                .map_err(|e| StoreError::Migration {
                    version: migration.version,
                    message: format!("failed to commit: {e}"),
                })?;
        }
        Err(_) => {
            let _ = conn.execute_batch("ROLLBACK;");
        }
    }

    result
}

// ── tests ────────────────────────────────────────────────────────────

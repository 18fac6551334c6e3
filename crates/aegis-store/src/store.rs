//! SQLite-backed session and event store.
//!
//! Sessions are rows in `sessions`; their events form an append-only log
//! in `events`. The single shared connection behind [`Database`] serialises
//! writes, so read order (`ORDER BY id`) always equals append order.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::events::{EventPayload, EventType, SessionEvent};
use crate::migration;

/// Session metadata as stored in the `sessions` table.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Unique identifier (UUID v7).
    pub session_id: String,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Free-form metadata map.
    pub metadata: Value,
}

/// CRUD operations on sessions and their event logs.
#[derive(Clone)]
pub struct SessionStore {
    db: Database,
}

impl SessionStore {
    /// Create a store backed by `db`. The database must be migrated
    /// (see [`Database::open_and_migrate`]).
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open a store at `path`, running migrations as needed.
    pub async fn open(path: impl AsRef<std::path::Path> + Send + 'static) -> StoreResult<Self> {
        let db = Database::open_and_migrate(path).await?;
        Ok(Self::new(db))
    }

    // ── sessions ─────────────────────────────────────────────────────

    /// Create a new session and return its id.
    pub async fn create_session(&self, metadata: Option<Value>) -> StoreResult<String> {
        let session_id = Uuid::now_v7().to_string();
        let created_at = Utc::now().to_rfc3339();
        let meta_json =
            serde_json::to_string(&metadata.unwrap_or_else(|| Value::Object(Default::default())))?;

        let id = session_id.clone();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (session_id, created_at, metadata) VALUES (?1, ?2, ?3)",
                    params![id, created_at, meta_json],
                )?;
                Ok(())
            })
            .await?;

        debug!(session_id = %session_id, "session created");
        Ok(session_id)
    }

    /// Fetch a session by id, or `None` if it does not exist.
    pub async fn get_session(&self, session_id: &str) -> StoreResult<Option<SessionInfo>> {
        let id = session_id.to_owned();
        self.db
            .execute(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT session_id, created_at, metadata FROM sessions WHERE session_id = ?1",
                        params![id],
                        map_session_row,
                    )
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;
                row.map(decode_session_row).transpose()
            })
            .await
    }

    /// List all sessions, newest first.
    pub async fn list_sessions(&self) -> StoreResult<Vec<SessionInfo>> {
        self.db
            .execute(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT session_id, created_at, metadata FROM sessions \
                     ORDER BY created_at DESC, rowid DESC",
                )?;
                let rows = stmt
                    .query_map([], map_session_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().map(decode_session_row).collect()
            })
            .await
    }

    /// Delete a session and all its events atomically.
    ///
    /// Returns [`StoreError::SessionNotFound`] if the session does not exist.
    pub async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        let id = session_id.to_owned();
        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM events WHERE session_id = ?1", params![id])?;
                let rows = tx.execute("DELETE FROM sessions WHERE session_id = ?1", params![id])?;
                tx.commit()?;
                if rows == 0 {
                    return Err(StoreError::SessionNotFound { session_id: id });
                }
                Ok(())
            })
            .await
    }

    // ── events ───────────────────────────────────────────────────────

    /// Persist a new event to the given session.
    ///
    /// Commits before returning; a crash between appends leaves the log in
    /// a consistent prefix state.
    pub async fn append_event(&self, session_id: &str, event: &SessionEvent) -> StoreResult<()> {
        let id = session_id.to_owned();
        let (event_type, payload) = event.payload.to_row_parts()?;
        let payload_json = serde_json::to_string(&payload)?;
        let event_id = event.event_id.clone();
        let turn_id = event.turn_id.clone();
        let timestamp = event.timestamp.to_rfc3339();

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO events \
                     (session_id, event_id, turn_id, event_type, timestamp, payload) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        id,
                        event_id,
                        turn_id,
                        event_type.as_str(),
                        timestamp,
                        payload_json
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Return events for a session in append order, optionally filtered by
    /// event type.
    pub async fn get_events(
        &self,
        session_id: &str,
        event_type: Option<EventType>,
    ) -> StoreResult<Vec<SessionEvent>> {
        let id = session_id.to_owned();
        self.db
            .execute(move |conn| {
                let mut events = Vec::new();
                let mut push_row = |row: &rusqlite::Row<'_>| -> StoreResult<()> {
                    events.push(decode_event_row(row)?);
                    Ok(())
                };

                match event_type {
                    Some(et) => {
                        let mut stmt = conn.prepare(
                            "SELECT event_id, turn_id, event_type, timestamp, payload \
                             FROM events WHERE session_id = ?1 AND event_type = ?2 \
                             ORDER BY id ASC",
                        )?;
                        let mut rows = stmt.query(params![id, et.as_str()])?;
                        while let Some(row) = rows.next()? {
                            push_row(row)?;
                        }
                    }
                    None => {
                        let mut stmt = conn.prepare(
                            "SELECT event_id, turn_id, event_type, timestamp, payload \
                             FROM events WHERE session_id = ?1 ORDER BY id ASC",
                        )?;
                        let mut rows = stmt.query(params![id])?;
                        while let Some(row) = rows.next()? {
                            push_row(row)?;
                        }
                    }
                }

                Ok(events)
            })
            .await
    }

    /// Current schema version of the backing database.
    pub async fn schema_version(&self) -> StoreResult<u32> {
        self.db.execute(migration::current_version).await
    }
}

// ── row mapping ──────────────────────────────────────────────────────

fn map_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode_session_row(
    (session_id, created_at, metadata): (String, String, String),
) -> StoreResult<SessionInfo> {
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| StoreError::MalformedEvent {
            reason: format!("bad session timestamp: {e}"),
        })?
        .with_timezone(&Utc);
    Ok(SessionInfo {
        session_id,
        created_at,
        metadata: serde_json::from_str(&metadata)?,
    })
}

fn decode_event_row(row: &rusqlite::Row<'_>) -> StoreResult<SessionEvent> {
    let event_id: String = row.get(0)?;
    let turn_id: String = row.get(1)?;
    let event_type: String = row.get(2)?;
    let timestamp: String = row.get(3)?;
    let payload_json: String = row.get(4)?;

    let payload_value: Value = serde_json::from_str(&payload_json)?;
    let payload = EventPayload::from_row_parts(&event_type, payload_value)?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| StoreError::MalformedEvent {
            reason: format!("bad event timestamp: {e}"),
        })?
        .with_timezone(&Utc);

    Ok(SessionEvent {
        event_id,
        turn_id,
        timestamp,
        payload,
    })
}

// ── tests ────────────────────────────────────────────────────────────

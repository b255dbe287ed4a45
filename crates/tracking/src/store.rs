//! Session and measure persistence.
//!
//! Sessions are created by the API; measures are appended by the collection
//! orchestrator only. A measure insert and the matching session total update
//! always happen in one transaction.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use telemesh_core::Reading;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// A tracking session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub id: String,
    pub owner_id: String,
    /// Unix seconds
    pub started_at: f64,
    /// Mirror of the runtime cumulative distance, rounded to centimetres
    pub total_distance_m: f64,
}

/// One accepted reading within a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measure {
    pub id: i64,
    pub session_id: String,
    /// Backend wall clock when the measure was recorded, Unix seconds
    pub ts: f64,
    pub lat: f64,
    pub lon: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub battery_pct: f64,
    /// Cumulative session distance at this point, not a delta
    pub distance_m: f64,
}

/// Storage collaborator used by the orchestrator and the read API.
pub trait Store: Send + Sync {
    fn create_session(&self, owner_id: &str, started_at: f64) -> StoreResult<Session>;

    fn get_session(&self, id: &str) -> StoreResult<Option<Session>>;

    /// Sessions for an owner, newest first.
    fn list_sessions(&self, owner_id: &str, limit: usize) -> StoreResult<Vec<Session>>;

    /// Last measure recorded for a session, in accumulation order.
    fn latest_measure(&self, session_id: &str) -> StoreResult<Option<Measure>>;

    /// Measures in record order.
    fn list_measures(&self, session_id: &str, limit: usize) -> StoreResult<Vec<Measure>>;

    /// Append a measure stamped `recorded_at` and set the session total to
    /// `distance_m`, atomically.
    fn record_measure(
        &self,
        session_id: &str,
        reading: &Reading,
        distance_m: f64,
        recorded_at: f64,
    ) -> StoreResult<Measure>;
}

/// SQLite-backed store.
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = Connection::open(path)?;
        Self::init(db)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(db: Connection) -> StoreResult<Self> {
        db.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                started_at REAL NOT NULL,
                total_distance_m REAL NOT NULL DEFAULT 0
             );
             CREATE TABLE IF NOT EXISTS measures (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL REFERENCES sessions(id),
                ts REAL NOT NULL,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                temperature REAL NOT NULL,
                humidity REAL NOT NULL,
                pressure REAL NOT NULL,
                battery_pct REAL NOT NULL,
                distance_m REAL NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_sessions_owner ON sessions(owner_id, started_at);
             CREATE INDEX IF NOT EXISTS idx_measures_session_ts ON measures(session_id, ts);",
        )?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|p| p.into_inner())
    }
}

const SESSION_COLUMNS: &str = "id, owner_id, started_at, total_distance_m";
const MEASURE_COLUMNS: &str =
    "id, session_id, ts, lat, lon, temperature, humidity, pressure, battery_pct, distance_m";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        started_at: row.get(2)?,
        total_distance_m: row.get(3)?,
    })
}

fn measure_from_row(row: &Row<'_>) -> rusqlite::Result<Measure> {
    Ok(Measure {
        id: row.get(0)?,
        session_id: row.get(1)?,
        ts: row.get(2)?,
        lat: row.get(3)?,
        lon: row.get(4)?,
        temperature: row.get(5)?,
        humidity: row.get(6)?,
        pressure: row.get(7)?,
        battery_pct: row.get(8)?,
        distance_m: row.get(9)?,
    })
}

impl Store for SqliteStore {
    fn create_session(&self, owner_id: &str, started_at: f64) -> StoreResult<Session> {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            started_at,
            total_distance_m: 0.0,
        };
        self.conn().execute(
            "INSERT INTO sessions (id, owner_id, started_at, total_distance_m)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.id,
                session.owner_id,
                session.started_at,
                session.total_distance_m
            ],
        )?;
        debug!(session = %session.id, owner = owner_id, "session created");
        Ok(session)
    }

    fn get_session(&self, id: &str) -> StoreResult<Option<Session>> {
        let session = self
            .conn()
            .query_row(
                &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS),
                [id],
                session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    fn list_sessions(&self, owner_id: &str, limit: usize) -> StoreResult<Vec<Session>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sessions WHERE owner_id = ?1
             ORDER BY started_at DESC, rowid DESC LIMIT ?2",
            SESSION_COLUMNS
        ))?;
        let sessions = stmt
            .query_map(params![owner_id, limit as i64], session_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    fn latest_measure(&self, session_id: &str) -> StoreResult<Option<Measure>> {
        let measure = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {} FROM measures WHERE session_id = ?1
                     ORDER BY id DESC LIMIT 1",
                    MEASURE_COLUMNS
                ),
                [session_id],
                measure_from_row,
            )
            .optional()?;
        Ok(measure)
    }

    fn list_measures(&self, session_id: &str, limit: usize) -> StoreResult<Vec<Measure>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM measures WHERE session_id = ?1
             ORDER BY id ASC LIMIT ?2",
            MEASURE_COLUMNS
        ))?;
        let measures = stmt
            .query_map(params![session_id, limit as i64], measure_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(measures)
    }

    fn record_measure(
        &self,
        session_id: &str,
        reading: &Reading,
        distance_m: f64,
        recorded_at: f64,
    ) -> StoreResult<Measure> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE sessions SET total_distance_m = ?1 WHERE id = ?2",
            params![distance_m, session_id],
        )?;
        if updated == 0 {
            return Err(StoreError::SessionMissing(session_id.to_string()));
        }

        tx.execute(
            "INSERT INTO measures
                (session_id, ts, lat, lon, temperature, humidity, pressure, battery_pct, distance_m)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                session_id,
                recorded_at,
                reading.latitude(),
                reading.longitude(),
                reading.temperature(),
                reading.humidity(),
                reading.pressure(),
                reading.battery_pct(),
                distance_m
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Measure {
            id,
            session_id: session_id.to_string(),
            ts: recorded_at,
            lat: reading.latitude(),
            lon: reading.longitude(),
            temperature: reading.temperature(),
            humidity: reading.humidity(),
            pressure: reading.pressure(),
            battery_pct: reading.battery_pct(),
            distance_m,
        })
    }
}

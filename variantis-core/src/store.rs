//! Capacity-bounded session store backed by SQLite
//!
//! One connection is shared behind a mutex. Every mutating sequence runs in
//! a single `IMMEDIATE` transaction so the active-session count can never be
//! read stale by a concurrent `start_session`. The lock is released before
//! any file or directory is deleted.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::artifacts::{remove_path, StorageLayout};
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, VariantisError};
use crate::types::{AlignmentParams, ArtifactPaths, PsaProgram, Session, SessionData, SessionId, SessionStatus};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS user_sessions (
        session_id    TEXT PRIMARY KEY,
        ip_address    TEXT NOT NULL,
        start_time    INTEGER NOT NULL,
        last_activity INTEGER NOT NULL,
        end_time      INTEGER
    );
    CREATE TABLE IF NOT EXISTS session_data (
        session_id                  TEXT PRIMARY KEY
                                    REFERENCES user_sessions(session_id) ON DELETE CASCADE,
        upload_file_path            TEXT NOT NULL,
        psa_program                 TEXT NOT NULL,
        gap_open                    REAL NOT NULL,
        gap_extend                  REAL NOT NULL,
        num_sequences               INTEGER NOT NULL,
        alignment_file_path         TEXT NOT NULL,
        user_alignment_file_path    TEXT NOT NULL,
        processed_file_path         TEXT NOT NULL,
        nucleotide_matrix_path      TEXT NOT NULL,
        user_nucleotide_matrix_path TEXT NOT NULL,
        transratio_matrix_path      TEXT NOT NULL,
        summary_features_path       TEXT NOT NULL,
        summary_alignment_path      TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_last_activity ON user_sessions(last_activity);
";

const SESSION_COLUMNS: &str = "session_id, ip_address, start_time, last_activity, end_time";

const DATA_COLUMNS: &str = "session_id, upload_file_path, psa_program, gap_open, gap_extend, num_sequences, \
     alignment_file_path, user_alignment_file_path, processed_file_path, nucleotide_matrix_path, \
     user_nucleotide_matrix_path, transratio_matrix_path, summary_features_path, summary_alignment_path";

/// Capacity and expiry limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPolicy {
    pub max_active_sessions: usize,
    /// Age after which a session expires regardless of activity
    pub absolute_ttl_minutes: i64,
    /// Inactivity after which the sweeper ends a session
    pub idle_timeout_minutes: i64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            max_active_sessions: 15,
            absolute_ttl_minutes: 30,
            idle_timeout_minutes: 15,
        }
    }
}

impl SessionPolicy {
    pub fn absolute_ttl(&self) -> Duration {
        Duration::minutes(self.absolute_ttl_minutes)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::minutes(self.idle_timeout_minutes)
    }
}

/// Fields of a `session_data` row supplied by the submitter
#[derive(Debug, Clone, PartialEq)]
pub struct NewSessionData {
    pub upload_file: PathBuf,
    pub params: AlignmentParams,
    pub num_sequences: usize,
    pub artifacts: ArtifactPaths,
}

pub struct SessionStore {
    conn: Mutex<Connection>,
    layout: StorageLayout,
    policy: SessionPolicy,
    clock: Arc<dyn Clock>,
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn conversion_error(idx: usize, err: VariantisError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn session_id_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<SessionId> {
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion_error(idx, e))
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: session_id_at(row, 0)?,
        client_addr: row.get(1)?,
        started_at: from_millis(2, row.get(2)?)?,
        last_activity: from_millis(3, row.get(3)?)?,
        ended_at: row.get::<_, Option<i64>>(4)?.map(|ms| from_millis(4, ms)).transpose()?,
    })
}

fn session_data_from_row(row: &Row<'_>) -> rusqlite::Result<SessionData> {
    let program: String = row.get(2)?;
    let program: PsaProgram = program.parse().map_err(|e| conversion_error(2, e))?;
    let num_sequences: i64 = row.get(5)?;
    let path = |idx: usize| row.get::<_, String>(idx).map(PathBuf::from);

    Ok(SessionData {
        session_id: session_id_at(row, 0)?,
        upload_file: path(1)?,
        params: AlignmentParams {
            program,
            gap_open: row.get(3)?,
            gap_extend: row.get(4)?,
        },
        num_sequences: num_sequences.max(0) as usize,
        artifacts: ArtifactPaths {
            alignment: path(6)?,
            user_alignment: path(7)?,
            processed_alignment: path(8)?,
            nucleotide_matrix: path(9)?,
            user_nucleotide_matrix: path(10)?,
            transratio_matrix: path(11)?,
            summary_features: path(12)?,
            summary_alignment: path(13)?,
        },
    })
}

fn query_session(conn: &Connection, id: &SessionId) -> rusqlite::Result<Option<Session>> {
    conn.query_row(
        &format!("SELECT {} FROM user_sessions WHERE session_id = ?1", SESSION_COLUMNS),
        [id.to_string()],
        session_from_row,
    )
    .optional()
}

fn query_session_data(conn: &Connection, id: &SessionId) -> rusqlite::Result<Option<SessionData>> {
    conn.query_row(
        &format!("SELECT {} FROM session_data WHERE session_id = ?1", DATA_COLUMNS),
        [id.to_string()],
        session_data_from_row,
    )
    .optional()
}

fn query_ids(conn: &Connection, sql: &str, cutoff: DateTime<Utc>) -> rusqlite::Result<Vec<SessionId>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt.query_map([to_millis(cutoff)], |row| session_id_at(row, 0))?;
    ids.collect()
}

impl SessionStore {
    /// Open (or create) the store at `db_path`.
    pub fn open<P: AsRef<Path>>(db_path: P, layout: StorageLayout, policy: SessionPolicy) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(StdDuration::from_secs(10))?;
        // journal_mode answers with the resulting mode.
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        log::info!("Opened session store at {} (journal mode {})", db_path.display(), mode);
        Self::init(conn, layout, policy)
    }

    /// Store with no backing file; every session is lost on drop.
    pub fn open_in_memory(layout: StorageLayout, policy: SessionPolicy) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, layout, policy)
    }

    fn init(conn: Connection, layout: StorageLayout, policy: SessionPolicy) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        layout.ensure_roots()?;
        Ok(Self {
            conn: Mutex::new(conn),
            layout,
            policy,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn immediate<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now - session.started_at > self.policy.absolute_ttl()
    }

    /// Register a new session unless the store is at capacity.
    pub fn start_session(&self, client_addr: &str) -> Result<SessionStatus> {
        let now = to_millis(self.clock.now());
        let capacity = self.policy.max_active_sessions;

        let status = self.immediate(|tx| {
            let active: i64 =
                tx.query_row("SELECT COUNT(*) FROM user_sessions WHERE end_time IS NULL", [], |row| {
                    row.get(0)
                })?;
            if active.max(0) as usize >= capacity {
                return Ok(SessionStatus::Busy);
            }

            let session_id = SessionId::generate();
            tx.execute(
                "INSERT INTO user_sessions (session_id, ip_address, start_time, last_activity, end_time) \
                 VALUES (?1, ?2, ?3, ?3, NULL)",
                params![session_id.to_string(), client_addr, now],
            )?;
            Ok(SessionStatus::Active { session_id })
        })?;

        match status {
            SessionStatus::Active { session_id } => {
                log::info!("Session started: {} from {}", session_id, client_addr)
            }
            SessionStatus::Busy => {
                log::info!("Session rejected at capacity ({}) for {}", capacity, client_addr)
            }
        }
        Ok(status)
    }

    /// Refresh last activity. Returns `false` for unknown or ended sessions
    /// and for sessions that are now past their absolute lifetime, which are
    /// marked ended here.
    pub fn touch(&self, id: &SessionId) -> Result<bool> {
        let now = self.clock.now();
        let ttl = self.policy.absolute_ttl();

        self.immediate(|tx| {
            let Some(session) = query_session(tx, id)? else {
                return Ok(false);
            };
            if !session.is_open() {
                return Ok(false);
            }

            tx.execute(
                "UPDATE user_sessions SET last_activity = ?1 WHERE session_id = ?2",
                params![to_millis(now), id.to_string()],
            )?;
            if now - session.started_at > ttl {
                tx.execute(
                    "UPDATE user_sessions SET end_time = ?1 WHERE session_id = ?2",
                    params![to_millis(now), id.to_string()],
                )?;
                log::info!("Session {} expired, marked ended", id);
                return Ok(false);
            }
            Ok(true)
        })
    }

    /// The session if it is open and within its lifetime. Otherwise it is
    /// ended and removed, and `None` is returned.
    pub fn get_active(&self, id: &SessionId) -> Result<Option<Session>> {
        let now = self.clock.now();
        let session = query_session(&self.conn.lock(), id)?;

        match session {
            None => Ok(None),
            Some(session) if !session.is_open() || self.is_expired(&session, now) => {
                self.end(id)?;
                Ok(None)
            }
            Some(session) => Ok(Some(session)),
        }
    }

    /// Session data for an open, unexpired session.
    pub fn get_session_data(&self, id: &SessionId) -> Result<Option<SessionData>> {
        if self.get_active(id)?.is_none() {
            return Ok(None);
        }
        Ok(query_session_data(&self.conn.lock(), id)?)
    }

    /// Record the session's data row. Only one may ever exist per session.
    pub fn insert_session_data(&self, id: &SessionId, data: NewSessionData) -> Result<SessionData> {
        let record = SessionData {
            session_id: *id,
            upload_file: data.upload_file,
            params: data.params,
            num_sequences: data.num_sequences,
            artifacts: data.artifacts,
        };

        self.immediate(|tx| {
            if query_session(tx, id)?.is_none() {
                return Err(VariantisError::not_found("Session"));
            }
            let a = &record.artifacts;
            let inserted = tx.execute(
                &format!(
                    "INSERT INTO session_data ({}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                    DATA_COLUMNS
                ),
                params![
                    id.to_string(),
                    path_text(&record.upload_file),
                    record.params.program.as_str(),
                    record.params.gap_open,
                    record.params.gap_extend,
                    record.num_sequences as i64,
                    path_text(&a.alignment),
                    path_text(&a.user_alignment),
                    path_text(&a.processed_alignment),
                    path_text(&a.nucleotide_matrix),
                    path_text(&a.user_nucleotide_matrix),
                    path_text(&a.transratio_matrix),
                    path_text(&a.summary_features),
                    path_text(&a.summary_alignment),
                ],
            );
            match inserted {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    Err(VariantisError::DuplicateSessionData { session_id: id.to_string() })
                }
                Err(e) => Err(e.into()),
            }
        })?;

        log::info!("Session data inserted for session {}", id);
        Ok(record)
    }

    /// End a session and delete everything it owns. Safe to call for ids
    /// that are unknown, already ended or only partly set up.
    pub fn end(&self, id: &SessionId) -> Result<()> {
        let now = to_millis(self.clock.now());

        let data = self.immediate(|tx| {
            tx.execute(
                "UPDATE user_sessions SET end_time = COALESCE(end_time, ?1) WHERE session_id = ?2",
                params![now, id.to_string()],
            )?;
            Ok(query_session_data(tx, id)?)
        })?;

        let mut failures = 0usize;
        let owned = data.iter().flat_map(|d| d.owned_paths().cloned().collect::<Vec<_>>());
        for path in owned.chain(self.layout.session_dirs(id)) {
            if let Err(e) = remove_path(&path) {
                log::warn!("Session {}: could not delete {}: {}", id, path.display(), e);
                failures += 1;
            }
        }

        let deleted = self
            .conn
            .lock()
            .execute("DELETE FROM user_sessions WHERE session_id = ?1", [id.to_string()])?;

        if failures > 0 {
            log::warn!("Session {} ended with {} undeleted path(s) left for the sweeper", id, failures);
        } else if deleted > 0 {
            log::info!("Session {} ended", id);
        } else {
            log::debug!("Session {} had no row; stray directories cleared", id);
        }
        Ok(())
    }

    pub fn count_active(&self) -> Result<usize> {
        let active: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM user_sessions WHERE end_time IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(active.max(0) as usize)
    }

    /// Open sessions with no activity since `cutoff`
    pub fn idle_sessions(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionId>> {
        Ok(query_ids(
            &self.conn.lock(),
            "SELECT session_id FROM user_sessions \
             WHERE end_time IS NULL AND last_activity < ?1 ORDER BY last_activity",
            cutoff,
        )?)
    }

    /// Sessions marked ended before `cutoff` whose rows still exist
    pub fn stale_ended_sessions(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionId>> {
        Ok(query_ids(
            &self.conn.lock(),
            "SELECT session_id FROM user_sessions \
             WHERE end_time IS NOT NULL AND end_time < ?1 ORDER BY end_time",
            cutoff,
        )?)
    }

    pub fn session_exists(&self, id: &SessionId) -> Result<bool> {
        Ok(query_session(&self.conn.lock(), id)?.is_some())
    }

    /// Every session row, oldest first
    pub fn sessions(&self) -> Result<Vec<Session>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM user_sessions ORDER BY start_time",
            SESSION_COLUMNS
        ))?;
        let sessions = stmt.query_map([], session_from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    /// Checkpoint the write-ahead log and vacuum.
    pub fn compact(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        conn.execute_batch("VACUUM")?;
        log::debug!("Session store compacted");
        Ok(())
    }

    #[cfg(test)]
    fn row_count(&self, table: &str) -> i64 {
        self.conn
            .lock()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::fs;
    use std::thread;
    use tempfile::{tempdir, TempDir};

    fn store_with_clock() -> (TempDir, SessionStore, Arc<ManualClock>) {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("uploads"), dir.path().join("results"));
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()));
        let store = SessionStore::open_in_memory(layout, SessionPolicy::default())
            .unwrap()
            .with_clock(clock.clone());
        (dir, store, clock)
    }

    fn start(store: &SessionStore) -> SessionId {
        match store.start_session("127.0.0.1").unwrap() {
            SessionStatus::Active { session_id } => session_id,
            SessionStatus::Busy => panic!("store unexpectedly busy"),
        }
    }

    fn populate(store: &SessionStore, id: &SessionId) -> SessionData {
        let layout = store.layout();
        layout.create_session_dirs(id).unwrap();
        let upload = layout.upload_dir(id).join("input.fasta");
        fs::write(&upload, ">a\nACGT\n>b\nACGA\n").unwrap();
        let artifacts = layout.artifact_paths(id);
        for path in artifacts.iter() {
            fs::write(path, "x").unwrap();
        }
        store
            .insert_session_data(
                id,
                NewSessionData {
                    upload_file: upload,
                    params: AlignmentParams { program: PsaProgram::Needle, gap_open: 10.0, gap_extend: 0.5 },
                    num_sequences: 2,
                    artifacts,
                },
            )
            .unwrap()
    }

    #[test]
    fn test_capacity_is_enforced() {
        let (_dir, store, _clock) = store_with_clock();
        for _ in 0..15 {
            start(&store);
        }
        assert_eq!(store.start_session("10.0.0.1").unwrap(), SessionStatus::Busy);
        assert_eq!(store.count_active().unwrap(), 15);
        assert_eq!(store.row_count("user_sessions"), 15);
    }

    #[test]
    fn test_capacity_under_concurrent_starts() {
        let (_dir, store, _clock) = store_with_clock();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..40)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.start_session(&format!("10.0.0.{}", i)).unwrap())
            })
            .collect();
        let statuses: Vec<SessionStatus> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let active = statuses.iter().filter(|s| matches!(s, SessionStatus::Active { .. })).count();
        assert_eq!(active, 15);
        assert_eq!(store.count_active().unwrap(), 15);
    }

    #[test]
    fn test_ending_frees_capacity() {
        let (_dir, store, _clock) = store_with_clock();
        let ids: Vec<_> = (0..15).map(|_| start(&store)).collect();
        assert_eq!(store.start_session("x").unwrap(), SessionStatus::Busy);
        store.end(&ids[3]).unwrap();
        assert!(matches!(store.start_session("x").unwrap(), SessionStatus::Active { .. }));
    }

    #[test]
    fn test_end_cascades_rows_and_files() {
        let (_dir, store, _clock) = store_with_clock();
        let id = start(&store);
        let data = populate(&store, &id);
        assert_eq!(store.get_session_data(&id).unwrap(), Some(data.clone()));

        store.end(&id).unwrap();

        assert!(!store.session_exists(&id).unwrap());
        assert_eq!(store.row_count("session_data"), 0);
        assert!(data.owned_paths().all(|p| !p.exists()));
        assert!(store.layout().session_dirs(&id).iter().all(|d| !d.exists()));
    }

    #[test]
    fn test_end_tolerates_missing_files_and_data() {
        let (_dir, store, _clock) = store_with_clock();
        let id = start(&store);
        let data = populate(&store, &id);
        fs::remove_file(&data.artifacts.summary_features).unwrap();
        store.end(&id).unwrap();
        assert!(!store.session_exists(&id).unwrap());

        // No data row, only empty directories.
        let bare = start(&store);
        store.layout().create_session_dirs(&bare).unwrap();
        store.end(&bare).unwrap();
        assert!(!store.session_exists(&bare).unwrap());
        assert!(!store.layout().upload_dir(&bare).exists());

        // Unknown id.
        store.end(&SessionId::generate()).unwrap();
    }

    #[test]
    fn test_duplicate_session_data_rejected() {
        let (_dir, store, _clock) = store_with_clock();
        let id = start(&store);
        let data = populate(&store, &id);
        let again = NewSessionData {
            upload_file: data.upload_file.clone(),
            params: data.params,
            num_sequences: data.num_sequences,
            artifacts: data.artifacts.clone(),
        };
        let err = store.insert_session_data(&id, again).unwrap_err();
        assert!(matches!(err, VariantisError::DuplicateSessionData { .. }));
        assert_eq!(store.row_count("session_data"), 1);
    }

    #[test]
    fn test_session_data_requires_session() {
        let (_dir, store, _clock) = store_with_clock();
        let id = SessionId::generate();
        let err = store
            .insert_session_data(
                &id,
                NewSessionData {
                    upload_file: PathBuf::from("in.fasta"),
                    params: AlignmentParams { program: PsaProgram::Stretcher, gap_open: 16.0, gap_extend: 4.0 },
                    num_sequences: 2,
                    artifacts: store.layout().artifact_paths(&id),
                },
            )
            .unwrap_err();
        assert!(matches!(err, VariantisError::NotFound { .. }));
    }

    #[test]
    fn test_touch_refreshes_then_expires() {
        let (_dir, store, clock) = store_with_clock();
        let id = start(&store);

        clock.advance(Duration::minutes(10));
        assert!(store.touch(&id).unwrap());
        let session = store.get_active(&id).unwrap().unwrap();
        assert_eq!(session.last_activity, clock.now());

        clock.advance(Duration::minutes(21));
        assert!(!store.touch(&id).unwrap());
        // Marked ended but not yet deleted.
        assert!(store.session_exists(&id).unwrap());
        assert_eq!(store.count_active().unwrap(), 0);

        assert!(!store.touch(&id).unwrap());
        assert!(!store.touch(&SessionId::generate()).unwrap());
    }

    #[test]
    fn test_expired_reads_are_idempotent() {
        let (_dir, store, clock) = store_with_clock();
        let id = start(&store);
        let data = populate(&store, &id);

        clock.advance(Duration::minutes(31));
        for _ in 0..3 {
            assert_eq!(store.get_active(&id).unwrap(), None);
            assert_eq!(store.get_session_data(&id).unwrap(), None);
            assert!(!store.session_exists(&id).unwrap());
        }
        assert!(!data.upload_file.exists());
        assert_eq!(store.row_count("session_data"), 0);
    }

    #[test]
    fn test_sweeper_queries() {
        let (_dir, store, clock) = store_with_clock();
        let t0 = clock.now();
        let old = start(&store);
        clock.advance(Duration::minutes(31));
        // Expired by touch: ended but not deleted.
        assert!(!store.touch(&old).unwrap());

        let idle = start(&store);
        let fresh = start(&store);
        clock.advance(Duration::minutes(19));
        assert!(store.touch(&fresh).unwrap());

        let cutoff = t0 + Duration::minutes(35);
        assert_eq!(store.idle_sessions(cutoff).unwrap(), vec![idle]);
        assert_eq!(store.stale_ended_sessions(cutoff).unwrap(), vec![old]);
        assert!(store.stale_ended_sessions(t0 + Duration::minutes(30)).unwrap().is_empty());
        assert_eq!(store.count_active().unwrap(), 2);
    }

    #[test]
    fn test_open_file_backed_store() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("uploads"), dir.path().join("results"));
        let db = dir.path().join("db").join("user_sessions.db");
        let id = {
            let store = SessionStore::open(&db, layout.clone(), SessionPolicy::default()).unwrap();
            let id = start(&store);
            store.compact().unwrap();
            id
        };
        let reopened = SessionStore::open(&db, layout, SessionPolicy::default()).unwrap();
        assert!(reopened.session_exists(&id).unwrap());
        assert_eq!(reopened.sessions().unwrap().len(), 1);
    }
}

//! SQLite-backed record store.
//!
//! Uses a single connection behind a mutex. Step transitions are claimed with
//! guarded UPDATEs so duplicate triggers from racing clients resolve to
//! exactly one winner.

use super::{
    indices_from_string, indices_to_string, StepKind, StepStatus, TranscriptionRecord,
    UploadSession,
};
use crate::error::{InnsiktError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    file_name TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    media_path TEXT NOT NULL,
    media_bytes INTEGER NOT NULL,
    status TEXT NOT NULL,
    transcript_text TEXT,
    transcript_error TEXT,
    transcribed_slices INTEGER NOT NULL DEFAULT 0,
    total_slices INTEGER NOT NULL DEFAULT 1,
    summary_status TEXT NOT NULL,
    summary_text TEXT,
    summary_error TEXT,
    analysis_status TEXT NOT NULL,
    analysis_json TEXT,
    analysis_error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_owner ON records(owner_id);
CREATE INDEX IF NOT EXISTS idx_records_created_at ON records(created_at);

CREATE TABLE IF NOT EXISTS upload_sessions (
    session_id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    file_name TEXT,
    mime_type TEXT,
    total_chunks INTEGER NOT NULL,
    received_chunks TEXT NOT NULL,
    total_bytes INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    last_activity TEXT NOT NULL
);
"#;

/// SQLite-backed store for records and upload sessions.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized record store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| InnsiktError::RecordStore(format!("Failed to acquire lock: {}", e)))
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Insert a new record.
    #[instrument(skip(self, record), fields(id = %record.id))]
    pub fn insert_record(&self, record: &TranscriptionRecord) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO records
            (id, owner_id, file_name, mime_type, media_path, media_bytes,
             status, transcript_text, transcript_error, transcribed_slices, total_slices,
             summary_status, summary_text, summary_error,
             analysis_status, analysis_json, analysis_error,
             created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
            params![
                record.id.to_string(),
                record.owner_id,
                record.file_name,
                record.mime_type,
                record.media_path,
                record.media_bytes as i64,
                record.status.as_str(),
                record.transcript_text,
                record.transcript_error,
                record.transcribed_slices,
                record.total_slices,
                record.summary_status.as_str(),
                record.summary_text,
                record.summary_error,
                record.analysis_status.as_str(),
                record.analysis_json,
                record.analysis_error,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;

        debug!("Inserted record {}", record.id);
        Ok(())
    }

    /// Fetch a record by id.
    pub fn get_record(&self, id: Uuid) -> Result<Option<TranscriptionRecord>> {
        let conn = self.lock()?;

        let record = conn.query_row(
            "SELECT * FROM records WHERE id = ?1",
            params![id.to_string()],
            row_to_record,
        );

        match record {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List an owner's records, newest first.
    #[instrument(skip(self))]
    pub fn list_records(&self, owner_id: &str) -> Result<Vec<TranscriptionRecord>> {
        let conn = self.lock()?;

        let mut stmt =
            conn.prepare("SELECT * FROM records WHERE owner_id = ?1 ORDER BY created_at DESC")?;
        let records = stmt.query_map(params![owner_id], row_to_record)?;

        Ok(records.filter_map(|r| r.ok()).collect())
    }

    /// List every record in the store, newest first.
    pub fn list_all_records(&self) -> Result<Vec<TranscriptionRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT * FROM records ORDER BY created_at DESC")?;
        let records = stmt.query_map([], row_to_record)?;

        Ok(records.filter_map(|r| r.ok()).collect())
    }

    /// Claim a step for processing.
    ///
    /// Succeeds only when the step is currently `pending` or `error` (a retry);
    /// returns false when another caller holds the step or it already finished.
    #[instrument(skip(self))]
    pub fn claim_step(&self, id: Uuid, step: StepKind) -> Result<bool> {
        let conn = self.lock()?;

        let sql = format!(
            "UPDATE records SET {col} = 'processing', {err} = NULL, updated_at = ?1 \
             WHERE id = ?2 AND {col} IN ('pending', 'error')",
            col = step.status_column(),
            err = step.error_column(),
        );

        let affected = conn.execute(&sql, params![Utc::now().to_rfc3339(), id.to_string()])?;
        Ok(affected > 0)
    }

    /// Mark a step failed, recording the error message.
    #[instrument(skip(self, message))]
    pub fn fail_step(&self, id: Uuid, step: StepKind, message: &str) -> Result<()> {
        let conn = self.lock()?;

        let sql = format!(
            "UPDATE records SET {col} = 'error', {err} = ?1, updated_at = ?2 WHERE id = ?3",
            col = step.status_column(),
            err = step.error_column(),
        );

        conn.execute(
            &sql,
            params![message, Utc::now().to_rfc3339(), id.to_string()],
        )?;
        Ok(())
    }

    /// Record the slice plan for an oversized transcription.
    pub fn set_slice_plan(&self, id: Uuid, total_slices: u32) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "UPDATE records SET total_slices = ?1, transcribed_slices = 0, updated_at = ?2 \
             WHERE id = ?3",
            params![total_slices, Utc::now().to_rfc3339(), id.to_string()],
        )?;
        Ok(())
    }

    /// Write incremental transcription progress (degraded mode).
    ///
    /// `transcribed_slices` is the durable checkpoint: continuation resumes
    /// from here after a crash.
    #[instrument(skip(self, text))]
    pub fn update_transcription_progress(
        &self,
        id: Uuid,
        text: &str,
        transcribed_slices: u32,
    ) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "UPDATE records SET status = 'partial', transcript_text = ?1, \
             transcribed_slices = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                text,
                transcribed_slices,
                Utc::now().to_rfc3339(),
                id.to_string()
            ],
        )?;
        Ok(())
    }

    /// Finish transcription with the full text.
    #[instrument(skip(self, text))]
    pub fn complete_transcription(&self, id: Uuid, text: &str) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "UPDATE records SET status = 'completed', transcript_text = ?1, \
             transcribed_slices = total_slices, transcript_error = NULL, updated_at = ?2 \
             WHERE id = ?3",
            params![text, Utc::now().to_rfc3339(), id.to_string()],
        )?;

        info!("Transcription completed for record {}", id);
        Ok(())
    }

    /// Finish summarization.
    #[instrument(skip(self, text))]
    pub fn complete_summary(&self, id: Uuid, text: &str) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "UPDATE records SET summary_status = 'completed', summary_text = ?1, \
             summary_error = NULL, updated_at = ?2 WHERE id = ?3",
            params![text, Utc::now().to_rfc3339(), id.to_string()],
        )?;
        Ok(())
    }

    /// Finish analysis with the serialized analysis object.
    #[instrument(skip(self, json))]
    pub fn complete_analysis(&self, id: Uuid, json: &str) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "UPDATE records SET analysis_status = 'completed', analysis_json = ?1, \
             analysis_error = NULL, updated_at = ?2 WHERE id = ?3",
            params![json, Utc::now().to_rfc3339(), id.to_string()],
        )?;
        Ok(())
    }

    /// Records whose transcription was interrupted by a restart.
    pub fn records_to_resume(&self) -> Result<Vec<TranscriptionRecord>> {
        let conn = self.lock()?;

        let mut stmt =
            conn.prepare("SELECT * FROM records WHERE status IN ('processing', 'partial')")?;
        let records = stmt.query_map([], row_to_record)?;

        Ok(records.filter_map(|r| r.ok()).collect())
    }

    // ========================================================================
    // Upload sessions
    // ========================================================================

    /// Insert or replace an upload session.
    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    pub fn save_session(&self, session: &UploadSession) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO upload_sessions
            (session_id, owner_id, file_name, mime_type, total_chunks,
             received_chunks, total_bytes, created_at, last_activity)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                session.session_id,
                session.owner_id,
                session.file_name,
                session.mime_type,
                session.total_chunks,
                indices_to_string(&session.received),
                session.total_bytes as i64,
                session.created_at.to_rfc3339(),
                session.last_activity.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch an upload session.
    pub fn get_session(&self, session_id: &str) -> Result<Option<UploadSession>> {
        let conn = self.lock()?;

        let session = conn.query_row(
            "SELECT session_id, owner_id, file_name, mime_type, total_chunks, \
             received_chunks, total_bytes, created_at, last_activity \
             FROM upload_sessions WHERE session_id = ?1",
            params![session_id],
            row_to_session,
        );

        match session {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List every upload session.
    pub fn list_sessions(&self) -> Result<Vec<UploadSession>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT session_id, owner_id, file_name, mime_type, total_chunks, \
             received_chunks, total_bytes, created_at, last_activity FROM upload_sessions",
        )?;
        let sessions = stmt.query_map([], row_to_session)?;

        Ok(sessions.filter_map(|s| s.ok()).collect())
    }

    /// Delete an upload session row.
    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "DELETE FROM upload_sessions WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_status(s: &str) -> StepStatus {
    s.parse().unwrap_or(StepStatus::Error)
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<TranscriptionRecord> {
    let id_str: String = row.get("id")?;
    let status: String = row.get("status")?;
    let summary_status: String = row.get("summary_status")?;
    let analysis_status: String = row.get("analysis_status")?;
    let media_bytes: i64 = row.get("media_bytes")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(TranscriptionRecord {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        owner_id: row.get("owner_id")?,
        file_name: row.get("file_name")?,
        mime_type: row.get("mime_type")?,
        media_path: row.get("media_path")?,
        media_bytes: media_bytes.max(0) as u64,
        status: parse_status(&status),
        transcript_text: row.get("transcript_text")?,
        transcript_error: row.get("transcript_error")?,
        transcribed_slices: row.get("transcribed_slices")?,
        total_slices: row.get("total_slices")?,
        summary_status: parse_status(&summary_status),
        summary_text: row.get("summary_text")?,
        summary_error: row.get("summary_error")?,
        analysis_status: parse_status(&analysis_status),
        analysis_json: row.get("analysis_json")?,
        analysis_error: row.get("analysis_error")?,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<UploadSession> {
    let received: String = row.get(5)?;
    let total_bytes: i64 = row.get(6)?;
    let created_at: String = row.get(7)?;
    let last_activity: String = row.get(8)?;

    Ok(UploadSession {
        session_id: row.get(0)?,
        owner_id: row.get(1)?,
        file_name: row.get(2)?,
        mime_type: row.get(3)?,
        total_chunks: row.get(4)?,
        received: indices_from_string(&received),
        total_bytes: total_bytes.max(0) as u64,
        created_at: parse_datetime(&created_at),
        last_activity: parse_datetime(&last_activity),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_record(owner: &str) -> TranscriptionRecord {
        TranscriptionRecord::new(
            owner.to_string(),
            "call.mp3".to_string(),
            "audio/mpeg".to_string(),
            "/data/media/x.mp3".to_string(),
            450,
        )
    }

    #[test]
    fn test_record_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let record = test_record("alice");

        store.insert_record(&record).unwrap();
        let loaded = store.get_record(record.id).unwrap().unwrap();

        assert_eq!(loaded.owner_id, "alice");
        assert_eq!(loaded.file_name, "call.mp3");
        assert_eq!(loaded.media_bytes, 450);
        assert_eq!(loaded.status, StepStatus::Pending);

        assert!(store.get_record(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_list_records_is_owner_scoped() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert_record(&test_record("alice")).unwrap();
        store.insert_record(&test_record("alice")).unwrap();
        store.insert_record(&test_record("bob")).unwrap();

        assert_eq!(store.list_records("alice").unwrap().len(), 2);
        assert_eq!(store.list_records("bob").unwrap().len(), 1);
        assert_eq!(store.list_all_records().unwrap().len(), 3);
    }

    #[test]
    fn test_claim_step_is_at_most_once() {
        let store = SqliteStore::in_memory().unwrap();
        let record = test_record("alice");
        store.insert_record(&record).unwrap();

        assert!(store.claim_step(record.id, StepKind::Transcription).unwrap());
        // Second claim loses while the first is still processing.
        assert!(!store.claim_step(record.id, StepKind::Transcription).unwrap());

        // Other steps are independent.
        assert!(store.claim_step(record.id, StepKind::Summary).unwrap());
        assert!(!store.claim_step(record.id, StepKind::Summary).unwrap());
    }

    #[test]
    fn test_failed_step_can_be_reclaimed() {
        let store = SqliteStore::in_memory().unwrap();
        let record = test_record("alice");
        store.insert_record(&record).unwrap();

        store.claim_step(record.id, StepKind::Summary).unwrap();
        store
            .fail_step(record.id, StepKind::Summary, "LLM unavailable")
            .unwrap();

        let loaded = store.get_record(record.id).unwrap().unwrap();
        assert_eq!(loaded.summary_status, StepStatus::Error);
        assert_eq!(loaded.summary_error.as_deref(), Some("LLM unavailable"));

        // A retry may claim again, and claiming clears the old error.
        assert!(store.claim_step(record.id, StepKind::Summary).unwrap());
        let loaded = store.get_record(record.id).unwrap().unwrap();
        assert!(loaded.summary_error.is_none());
    }

    #[test]
    fn test_transcription_progress_checkpoint() {
        let store = SqliteStore::in_memory().unwrap();
        let record = test_record("alice");
        store.insert_record(&record).unwrap();

        store.claim_step(record.id, StepKind::Transcription).unwrap();
        store.set_slice_plan(record.id, 3).unwrap();
        store
            .update_transcription_progress(record.id, "first slice", 1)
            .unwrap();

        let loaded = store.get_record(record.id).unwrap().unwrap();
        assert_eq!(loaded.status, StepStatus::Partial);
        assert_eq!(loaded.transcribed_slices, 1);
        assert_eq!(loaded.total_slices, 3);

        // Interrupted records are picked up for resume.
        let resumable = store.records_to_resume().unwrap();
        assert_eq!(resumable.len(), 1);

        store
            .complete_transcription(record.id, "first slice second slice third slice")
            .unwrap();
        let loaded = store.get_record(record.id).unwrap().unwrap();
        assert_eq!(loaded.status, StepStatus::Completed);
        assert_eq!(loaded.transcribed_slices, 3);
        assert!(store.records_to_resume().unwrap().is_empty());
    }

    #[test]
    fn test_session_round_trip() {
        let store = SqliteStore::in_memory().unwrap();

        let mut session = UploadSession::new("abc".to_string(), "alice".to_string(), 3);
        session.file_name = Some("call.mp3".to_string());
        session.mark_received(0, 100);
        session.mark_received(2, 150);
        store.save_session(&session).unwrap();

        let loaded = store.get_session("abc").unwrap().unwrap();
        assert_eq!(loaded.total_chunks, 3);
        assert_eq!(loaded.received, vec![0, 2]);
        assert_eq!(loaded.total_bytes, 250);
        assert_eq!(loaded.file_name.as_deref(), Some("call.mp3"));

        store.delete_session("abc").unwrap();
        assert!(store.get_session("abc").unwrap().is_none());
        assert!(store.list_sessions().unwrap().is_empty());
    }
}

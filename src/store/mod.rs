//! Record store for Innsikt.
//!
//! Holds the two persistent shapes of the pipeline: upload sessions (transient,
//! deleted at finalize or swept when stale) and transcription records (one row
//! per interview, carrying three independently-advancing step statuses).

mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of one processing step.
///
/// `Partial` is only used by transcription, while a leading slice has been
/// transcribed and background continuation is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Processing,
    Partial,
    Completed,
    Error,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Processing => "processing",
            StepStatus::Partial => "partial",
            StepStatus::Completed => "completed",
            StepStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StepStatus::Pending),
            "processing" => Ok(StepStatus::Processing),
            "partial" => Ok(StepStatus::Partial),
            "completed" => Ok(StepStatus::Completed),
            "error" => Ok(StepStatus::Error),
            _ => Err(format!("Unknown step status: {}", s)),
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The three steps that share a record row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Transcription,
    Summary,
    Analysis,
}

impl StepKind {
    /// Column holding this step's status.
    pub(crate) fn status_column(&self) -> &'static str {
        match self {
            StepKind::Transcription => "status",
            StepKind::Summary => "summary_status",
            StepKind::Analysis => "analysis_status",
        }
    }

    /// Column holding this step's last error message.
    pub(crate) fn error_column(&self) -> &'static str {
        match self {
            StepKind::Transcription => "transcript_error",
            StepKind::Summary => "summary_error",
            StepKind::Analysis => "analysis_error",
        }
    }
}

/// The database row tracking one interview's processing pipeline state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub file_name: String,
    pub mime_type: String,
    pub media_path: String,
    pub media_bytes: u64,
    pub status: StepStatus,
    pub transcript_text: Option<String>,
    pub transcript_error: Option<String>,
    /// Slices transcribed so far (checkpoint for background continuation).
    pub transcribed_slices: u32,
    pub total_slices: u32,
    pub summary_status: StepStatus,
    pub summary_text: Option<String>,
    pub summary_error: Option<String>,
    pub analysis_status: StepStatus,
    pub analysis_json: Option<String>,
    pub analysis_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TranscriptionRecord {
    /// Create a fresh record with every step pending.
    pub fn new(
        owner_id: String,
        file_name: String,
        mime_type: String,
        media_path: String,
        media_bytes: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            file_name,
            mime_type,
            media_path,
            media_bytes,
            status: StepStatus::Pending,
            transcript_text: None,
            transcript_error: None,
            transcribed_slices: 0,
            total_slices: 1,
            summary_status: StepStatus::Pending,
            summary_text: None,
            summary_error: None,
            analysis_status: StepStatus::Pending,
            analysis_json: None,
            analysis_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A chunked upload in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub session_id: String,
    pub owner_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub total_chunks: u32,
    /// Indices received so far, in arrival order.
    pub received: Vec<u32>,
    pub total_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl UploadSession {
    /// Create a session for its first observed chunk.
    pub fn new(session_id: String, owner_id: String, total_chunks: u32) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            owner_id,
            file_name: None,
            mime_type: None,
            total_chunks,
            received: Vec::new(),
            total_bytes: 0,
            created_at: now,
            last_activity: now,
        }
    }

    /// Record a chunk arrival. Duplicate indices are kept once.
    pub fn mark_received(&mut self, index: u32, bytes: u64) {
        if !self.received.contains(&index) {
            self.received.push(index);
        }
        self.total_bytes += bytes;
        self.last_activity = Utc::now();
    }

    /// Whether the session has been idle longer than `ttl_seconds`.
    pub fn is_stale(&self, ttl_seconds: u64, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_activity)
            .num_seconds()
            .max(0) as u64
            > ttl_seconds
    }
}

/// Serialize received indices for storage (comma-separated).
pub(crate) fn indices_to_string(indices: &[u32]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse received indices from storage.
pub(crate) fn indices_from_string(s: &str) -> Vec<u32> {
    s.split(',')
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            StepStatus::Pending,
            StepStatus::Processing,
            StepStatus::Partial,
            StepStatus::Completed,
            StepStatus::Error,
        ] {
            let parsed: StepStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_indices_round_trip() {
        let indices = vec![0, 3, 1];
        let s = indices_to_string(&indices);
        assert_eq!(s, "0,3,1");
        assert_eq!(indices_from_string(&s), indices);
        assert!(indices_from_string("").is_empty());
    }

    #[test]
    fn test_mark_received_is_idempotent_on_index() {
        let mut session = UploadSession::new("s1".to_string(), "alice".to_string(), 3);
        session.mark_received(1, 100);
        session.mark_received(1, 100);
        session.mark_received(0, 50);

        assert_eq!(session.received, vec![1, 0]);
        // Overwrites still count toward traffic, not toward the index set.
        assert_eq!(session.total_bytes, 250);
    }

    #[test]
    fn test_staleness() {
        let mut session = UploadSession::new("s1".to_string(), "alice".to_string(), 3);
        session.last_activity = Utc::now() - chrono::Duration::seconds(7200);

        assert!(session.is_stale(3600, Utc::now()));
        assert!(!session.is_stale(86_400, Utc::now()));
    }

    #[test]
    fn test_new_record_starts_pending() {
        let record = TranscriptionRecord::new(
            "alice".to_string(),
            "call.mp3".to_string(),
            "audio/mpeg".to_string(),
            "/data/media/x.mp3".to_string(),
            450,
        );

        assert_eq!(record.status, StepStatus::Pending);
        assert_eq!(record.summary_status, StepStatus::Pending);
        assert_eq!(record.analysis_status, StepStatus::Pending);
        assert_eq!(record.total_slices, 1);
    }
}

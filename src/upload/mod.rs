//! Chunked upload handling.
//!
//! Chunks arrive in any order, one per request, addressed by
//! (session id, chunk index). Finalize verifies the set is complete,
//! assembles the media object in index order, and creates the record.

use crate::config::UploadSettings;
use crate::error::{InnsiktError, Result};
use crate::media::MediaStore;
use crate::store::{SqliteStore, TranscriptionRecord, UploadSession};
use std::sync::Arc;
use tracing::{info, instrument, warn};

const DEFAULT_FILE_NAME: &str = "upload.bin";
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Metadata accompanying a chunk. The first chunk (index 0) carries the
/// file name and type; later chunks may omit them.
#[derive(Debug, Clone, Default)]
pub struct ChunkMeta {
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

/// Acknowledgement for a stored chunk.
#[derive(Debug, Clone)]
pub struct ChunkReceipt {
    pub session_id: String,
    pub chunk_index: u32,
    pub received_count: u32,
    pub total_chunks: u32,
}

/// Receives chunks and finalizes upload sessions.
pub struct UploadManager {
    store: Arc<SqliteStore>,
    media: Arc<MediaStore>,
    settings: UploadSettings,
}

impl UploadManager {
    pub fn new(store: Arc<SqliteStore>, media: Arc<MediaStore>, settings: UploadSettings) -> Self {
        Self {
            store,
            media,
            settings,
        }
    }

    /// Store one chunk. Duplicate indices overwrite; arrival order is free.
    #[instrument(skip(self, meta, bytes), fields(len = bytes.len()))]
    pub async fn receive_chunk(
        &self,
        owner_id: &str,
        session_id: &str,
        chunk_index: u32,
        total_chunks: u32,
        meta: ChunkMeta,
        bytes: &[u8],
    ) -> Result<ChunkReceipt> {
        validate_session_id(session_id)?;

        if total_chunks == 0 || total_chunks > self.settings.max_chunks {
            return Err(InnsiktError::InvalidInput(format!(
                "total_chunks must be between 1 and {}",
                self.settings.max_chunks
            )));
        }
        if chunk_index >= total_chunks {
            return Err(InnsiktError::InvalidInput(format!(
                "chunk_index {} out of range for {} chunks",
                chunk_index, total_chunks
            )));
        }
        if bytes.is_empty() {
            return Err(InnsiktError::InvalidInput("Empty chunk".to_string()));
        }
        if bytes.len() as u64 > self.settings.max_chunk_bytes {
            return Err(InnsiktError::InvalidInput(format!(
                "Chunk of {} bytes exceeds the {} byte limit",
                bytes.len(),
                self.settings.max_chunk_bytes
            )));
        }

        let mut session = match self.store.get_session(session_id)? {
            Some(existing) => {
                if existing.owner_id != owner_id {
                    return Err(InnsiktError::Forbidden(format!(
                        "Session {} belongs to another owner",
                        session_id
                    )));
                }
                if existing.total_chunks != total_chunks {
                    return Err(InnsiktError::InvalidInput(format!(
                        "Session {} expects {} chunks, request declared {}",
                        session_id, existing.total_chunks, total_chunks
                    )));
                }
                existing
            }
            None => {
                info!("Starting upload session {}", session_id);
                UploadSession::new(session_id.to_string(), owner_id.to_string(), total_chunks)
            }
        };

        if let Some(name) = meta.file_name {
            session.file_name = Some(name);
        }
        if let Some(mime) = meta.mime_type {
            session.mime_type = Some(mime);
        }

        // A failed write fails this chunk only; already-staged chunks stay.
        self.media
            .write_chunk(session_id, chunk_index, bytes)
            .await?;

        session.mark_received(chunk_index, bytes.len() as u64);
        self.store.save_session(&session)?;

        Ok(ChunkReceipt {
            session_id: session_id.to_string(),
            chunk_index,
            received_count: session.received.len() as u32,
            total_chunks,
        })
    }

    /// Verify completeness, assemble the media object, and create the record.
    ///
    /// Fails listing every missing index when the set is incomplete; there is
    /// no partial finalize.
    #[instrument(skip(self))]
    pub async fn finalize(
        &self,
        owner_id: &str,
        session_id: &str,
        total_chunks: u32,
    ) -> Result<TranscriptionRecord> {
        validate_session_id(session_id)?;

        let session = self
            .store
            .get_session(session_id)?
            .ok_or_else(|| InnsiktError::NotFound(format!("Upload session {}", session_id)))?;

        if session.owner_id != owner_id {
            return Err(InnsiktError::Forbidden(format!(
                "Session {} belongs to another owner",
                session_id
            )));
        }
        if session.total_chunks != total_chunks {
            return Err(InnsiktError::InvalidInput(format!(
                "Session {} expects {} chunks, finalize declared {}",
                session_id, session.total_chunks, total_chunks
            )));
        }

        let file_name = session
            .file_name
            .clone()
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
        let mime_type = session
            .mime_type
            .clone()
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        let mut record = TranscriptionRecord::new(
            owner_id.to_string(),
            file_name.clone(),
            mime_type,
            String::new(),
            0,
        );

        let media_path = self.media.media_path(record.id, &file_name);
        let total_bytes = self
            .media
            .assemble(session_id, total_chunks, &media_path)
            .await?;

        record.media_path = media_path.to_string_lossy().to_string();
        record.media_bytes = total_bytes;
        self.store.insert_record(&record)?;

        // Cleanup is best-effort; the record is already durable.
        if let Err(e) = self.store.delete_session(session_id) {
            warn!("Failed to delete session row {}: {}", session_id, e);
        }
        self.media.discard_session(session_id).await;

        info!(
            "Finalized session {} into record {} ({} bytes)",
            session_id, record.id, total_bytes
        );
        Ok(record)
    }

    /// Delete sessions idle past the TTL together with their staged chunks.
    pub async fn sweep_stale_sessions(&self) -> Result<usize> {
        let now = chrono::Utc::now();
        let mut swept = 0;

        for session in self.store.list_sessions()? {
            if session.is_stale(self.settings.session_ttl_seconds, now) {
                info!(
                    "Sweeping stale upload session {} (last activity {})",
                    session.session_id, session.last_activity
                );
                self.media.discard_session(&session.session_id).await;
                self.store.delete_session(&session.session_id)?;
                swept += 1;
            }
        }

        Ok(swept)
    }
}

/// Session ids become path components; keep them boring.
fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id.len() <= 64
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(InnsiktError::InvalidInput(format!(
            "Invalid session id: {:?}",
            session_id
        )))
    }
}

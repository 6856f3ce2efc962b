//! Transcription orchestration against the record store.
//!
//! Owns the direct-vs-degraded decision, the slice plan for oversized media,
//! and the checkpointed continuation loop the background worker runs.

use super::Transcriber;
use crate::config::TranscriptionSettings;
use crate::error::{InnsiktError, Result};
use crate::media::MediaStore;
use crate::store::{SqliteStore, StepKind, StepStatus, TranscriptionRecord};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Result of a transcribe request.
#[derive(Debug)]
pub struct TranscribeOutcome {
    /// Record state after the inline work.
    pub record: TranscriptionRecord,
    /// True when remaining slices must be processed by the background worker.
    pub continuation_needed: bool,
}

/// Drives the transcription step for records.
pub struct TranscriptionRequester {
    store: Arc<SqliteStore>,
    media: Arc<MediaStore>,
    transcriber: Arc<dyn Transcriber>,
    settings: TranscriptionSettings,
}

impl TranscriptionRequester {
    pub fn new(
        store: Arc<SqliteStore>,
        media: Arc<MediaStore>,
        transcriber: Arc<dyn Transcriber>,
        settings: TranscriptionSettings,
    ) -> Self {
        Self {
            store,
            media,
            transcriber,
            settings,
        }
    }

    /// Start transcription for a record.
    ///
    /// Small media is transcribed inline to completion. Oversized media gets
    /// its leading slice transcribed inline (status `partial`) and reports
    /// that a continuation is needed.
    #[instrument(skip(self))]
    pub async fn transcribe_record(&self, id: Uuid) -> Result<TranscribeOutcome> {
        let record = self
            .store
            .get_record(id)?
            .ok_or_else(|| InnsiktError::NotFound(format!("Record {}", id)))?;

        if !self.store.claim_step(id, StepKind::Transcription)? {
            return Err(InnsiktError::Conflict(format!(
                "Transcription for {} is {}",
                id, record.status
            )));
        }

        let bytes = match self.media.read_media(&record.media_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.store
                    .fail_step(id, StepKind::Transcription, &e.to_string())?;
                return Err(e);
            }
        };

        if bytes.len() as u64 <= self.settings.direct_limit_bytes {
            info!("Transcribing {} ({} bytes) directly", id, bytes.len());

            match self
                .transcriber
                .transcribe_bytes(&record.file_name, bytes)
                .await
            {
                Ok(text) => {
                    self.store.complete_transcription(id, &text)?;
                }
                Err(e) => {
                    self.store
                        .fail_step(id, StepKind::Transcription, &e.to_string())?;
                    return Err(e);
                }
            }

            let record = self.require_record(id)?;
            return Ok(TranscribeOutcome {
                record,
                continuation_needed: false,
            });
        }

        // Degraded mode: transcribe the leading slice now, the rest later.
        let total_slices = slice_count(bytes.len() as u64, self.settings.slice_bytes);
        info!(
            "Media for {} is {} bytes, degrading to {} slices",
            id,
            bytes.len(),
            total_slices
        );
        self.store.set_slice_plan(id, total_slices)?;

        let leading = slice_of(&bytes, 0, total_slices).to_vec();
        match self
            .transcriber
            .transcribe_bytes(&slice_file_name(&record.file_name, 0), leading)
            .await
        {
            Ok(text) => {
                self.store.update_transcription_progress(id, &text, 1)?;
            }
            Err(e) => {
                self.store
                    .fail_step(id, StepKind::Transcription, &e.to_string())?;
                return Err(e);
            }
        }

        let record = self.require_record(id)?;
        Ok(TranscribeOutcome {
            record,
            continuation_needed: true,
        })
    }

    /// Process remaining slices from the persisted checkpoint.
    ///
    /// Runs on the background worker; also invoked at startup for records a
    /// restart left in `processing` or `partial`.
    #[instrument(skip(self))]
    pub async fn continue_transcription(&self, id: Uuid) -> Result<()> {
        let record = self
            .store
            .get_record(id)?
            .ok_or_else(|| InnsiktError::NotFound(format!("Record {}", id)))?;

        match record.status {
            StepStatus::Partial | StepStatus::Processing => {}
            other => {
                // Stale job; the record moved on without us.
                warn!("Skipping continuation for {} in status {}", id, other);
                return Ok(());
            }
        }

        let bytes = match self.media.read_media(&record.media_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.store
                    .fail_step(id, StepKind::Transcription, &e.to_string())?;
                return Err(e);
            }
        };

        let total_slices = record.total_slices.max(1);
        let mut text = record.transcript_text.clone().unwrap_or_default();

        // A restart before the first slice landed restarts from slice 0.
        let start = record.transcribed_slices;

        for index in start..total_slices {
            let slice = slice_of(&bytes, index, total_slices).to_vec();
            if slice.is_empty() {
                continue;
            }

            match self
                .transcriber
                .transcribe_bytes(&slice_file_name(&record.file_name, index), slice)
                .await
            {
                Ok(part) => {
                    if !text.is_empty() && !part.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(&part);
                    self.store
                        .update_transcription_progress(id, &text, index + 1)?;
                    info!("Record {}: slice {}/{} done", id, index + 1, total_slices);
                }
                Err(e) => {
                    let message = format!("Slice {}/{} failed: {}", index + 1, total_slices, e);
                    self.store
                        .fail_step(id, StepKind::Transcription, &message)?;
                    return Err(InnsiktError::Transcription(message));
                }
            }
        }

        self.store.complete_transcription(id, &text)?;
        Ok(())
    }

    fn require_record(&self, id: Uuid) -> Result<TranscriptionRecord> {
        self.store
            .get_record(id)?
            .ok_or_else(|| InnsiktError::NotFound(format!("Record {}", id)))
    }
}

/// Number of slices for a media size under the configured slice size.
fn slice_count(total_bytes: u64, slice_bytes: u64) -> u32 {
    let slice_bytes = slice_bytes.max(1);
    total_bytes.div_ceil(slice_bytes).max(1) as u32
}

/// Byte range of one slice under an even split.
///
/// Boundaries derive from the stored slice count, so a resumed continuation
/// sees the same ranges even if the configured slice size has changed.
fn slice_of(bytes: &[u8], index: u32, total_slices: u32) -> &[u8] {
    let total = total_slices.max(1) as usize;
    let len = bytes.len();
    let per_slice = len.div_ceil(total);
    let start = (index as usize * per_slice).min(len);
    let end = (start + per_slice).min(len);
    &bytes[start..end]
}

fn slice_file_name(file_name: &str, index: u32) -> String {
    if index == 0 {
        file_name.to_string()
    } else {
        format!("part{}-{}", index, file_name)
    }
}

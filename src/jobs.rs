//! Background job queue.
//!
//! One worker task drains an in-process queue of transcription
//! continuations. Jobs are cheap handles; the durable state (the slice
//! checkpoint) lives on the record, so a lost queue is recovered at startup
//! by re-enqueueing interrupted records.

use crate::error::{InnsiktError, Result};
use crate::transcription::TranscriptionRequester;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Work items for the background worker.
#[derive(Debug, Clone)]
pub enum Job {
    /// Process remaining transcription slices for a record.
    ContinueTranscription { record_id: Uuid },
}

/// Handle for submitting jobs.
#[derive(Clone)]
pub struct JobQueue {
    tx: UnboundedSender<Job>,
}

impl JobQueue {
    /// Create a queue and the receiver its worker will drain.
    pub fn channel() -> (Self, UnboundedReceiver<Job>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a job.
    pub fn submit(&self, job: Job) -> Result<()> {
        self.tx
            .send(job)
            .map_err(|_| InnsiktError::Conflict("Background worker is gone".to_string()))
    }
}

/// Spawn the worker task draining the queue.
pub fn spawn_worker(
    mut rx: UnboundedReceiver<Job>,
    requester: Arc<TranscriptionRequester>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Background worker started");

        while let Some(job) = rx.recv().await {
            match job {
                Job::ContinueTranscription { record_id } => {
                    if let Err(e) = requester.continue_transcription(record_id).await {
                        // The failure is already recorded on the record's
                        // status; here we only log it.
                        warn!("Continuation for {} failed: {}", record_id, e);
                    }
                }
            }
        }

        info!("Background worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranscriptionSettings;
    use crate::media::MediaStore;
    use crate::store::{SqliteStore, StepKind, StepStatus, TranscriptionRecord};
    use crate::transcription::Transcriber;
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct EchoTranscriber;

    #[async_trait]
    impl Transcriber for EchoTranscriber {
        async fn transcribe_bytes(
            &self,
            _file_name: &str,
            bytes: Vec<u8>,
        ) -> crate::error::Result<String> {
            Ok(String::from_utf8_lossy(&bytes).to_string())
        }
    }

    #[tokio::test]
    async fn test_worker_finishes_an_interrupted_transcription() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let media = Arc::new(
            MediaStore::new(dir.path().join("staging"), dir.path().join("media")).unwrap(),
        );

        let mut record = TranscriptionRecord::new(
            "alice".to_string(),
            "call.mp3".to_string(),
            "audio/mpeg".to_string(),
            String::new(),
            0,
        );
        let path = media.media_path(record.id, "call.mp3");
        media.write_media(&path, b"interview text").await.unwrap();
        record.media_path = path.to_string_lossy().to_string();
        store.insert_record(&record).unwrap();

        // A restart left this record mid-transcription.
        store.claim_step(record.id, StepKind::Transcription).unwrap();
        store.set_slice_plan(record.id, 1).unwrap();
        store
            .update_transcription_progress(record.id, "", 0)
            .unwrap();

        let requester = Arc::new(TranscriptionRequester::new(
            store.clone(),
            media,
            Arc::new(EchoTranscriber),
            TranscriptionSettings::default(),
        ));

        let (queue, rx) = JobQueue::channel();
        let worker = spawn_worker(rx, requester);

        queue
            .submit(Job::ContinueTranscription {
                record_id: record.id,
            })
            .unwrap();

        // Dropping the queue closes the channel and lets the worker exit.
        drop(queue);
        worker.await.unwrap();

        let loaded = store.get_record(record.id).unwrap().unwrap();
        assert_eq!(loaded.status, StepStatus::Completed);
        assert_eq!(loaded.transcript_text.as_deref(), Some("interview text"));
    }

    #[tokio::test]
    async fn test_submit_after_worker_exit_errors() {
        let (queue, rx) = JobQueue::channel();
        drop(rx);

        let err = queue
            .submit(Job::ContinueTranscription {
                record_id: Uuid::new_v4(),
            })
            .unwrap_err();
        assert!(matches!(err, InnsiktError::Conflict(_)));
    }
}

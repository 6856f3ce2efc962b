//! Pipeline orchestrator for Innsikt.
//!
//! Constructs every service handle once per process and exposes the
//! operations the HTTP API and CLI share. Handlers never touch module-level
//! state; everything flows through this struct.

use crate::analysis::{AnalysisData, Analyzer, Summarizer, Summary};
use crate::chat::{ChatAssistant, ChatMessage};
use crate::config::{Prompts, Settings};
use crate::error::{InnsiktError, Result};
use crate::jobs::{spawn_worker, Job, JobQueue};
use crate::media::MediaStore;
use crate::store::{SqliteStore, StepKind, TranscriptionRecord};
use crate::transcription::{Transcriber, TranscriptionRequester, WhisperTranscriber};
use crate::upload::{ChunkMeta, ChunkReceipt, UploadManager};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// The main orchestrator for the Innsikt pipeline.
pub struct Orchestrator {
    settings: Settings,
    store: Arc<SqliteStore>,
    media: Arc<MediaStore>,
    uploads: UploadManager,
    requester: Arc<TranscriptionRequester>,
    summarizer: Summarizer,
    analyzer: Analyzer,
    chat: ChatAssistant,
    jobs: JobQueue,
}

impl Orchestrator {
    /// Create an orchestrator with default components and start its worker.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let transcriber: Arc<dyn Transcriber> = Arc::new(WhisperTranscriber::new(
            &settings.transcription.model,
            Duration::from_secs(settings.transcription.request_timeout_seconds),
            settings.retry.clone(),
        ));

        Self::with_components(settings, prompts, transcriber)
    }

    /// Create an orchestrator with a custom transcriber.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        transcriber: Arc<dyn Transcriber>,
    ) -> Result<Self> {
        let store = Arc::new(SqliteStore::new(&settings.sqlite_path())?);
        let media = Arc::new(MediaStore::new(settings.temp_dir(), settings.media_dir())?);

        let uploads = UploadManager::new(store.clone(), media.clone(), settings.upload.clone());

        let requester = Arc::new(TranscriptionRequester::new(
            store.clone(),
            media.clone(),
            transcriber,
            settings.transcription.clone(),
        ));

        let summarizer = Summarizer::new(
            &settings.summary,
            settings.retry.clone(),
            prompts.clone(),
        );
        let analyzer = Analyzer::new(&settings.analysis, settings.retry.clone(), prompts.clone());
        let chat = ChatAssistant::new(&settings.chat, settings.retry.clone(), prompts);

        let (jobs, rx) = JobQueue::channel();
        // Dropping the handle detaches the worker; it exits when the queue closes.
        let _worker = spawn_worker(rx, requester.clone());

        Ok(Self {
            settings,
            store,
            media,
            uploads,
            requester,
            summarizer,
            analyzer,
            chat,
            jobs,
        })
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ========================================================================
    // Upload
    // ========================================================================

    /// Store one uploaded chunk.
    pub async fn receive_chunk(
        &self,
        owner_id: &str,
        session_id: &str,
        chunk_index: u32,
        total_chunks: u32,
        meta: ChunkMeta,
        bytes: &[u8],
    ) -> Result<ChunkReceipt> {
        self.uploads
            .receive_chunk(owner_id, session_id, chunk_index, total_chunks, meta, bytes)
            .await
    }

    /// Finalize an upload session into a record.
    pub async fn finalize_upload(
        &self,
        owner_id: &str,
        session_id: &str,
        total_chunks: u32,
    ) -> Result<TranscriptionRecord> {
        self.uploads
            .finalize(owner_id, session_id, total_chunks)
            .await
    }

    /// Create a record from media bytes in one shot (small files).
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn create_record(
        &self,
        owner_id: &str,
        file_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<TranscriptionRecord> {
        if bytes.is_empty() {
            return Err(InnsiktError::InvalidInput("Empty media upload".to_string()));
        }

        let mut record = TranscriptionRecord::new(
            owner_id.to_string(),
            file_name.to_string(),
            mime_type.to_string(),
            String::new(),
            bytes.len() as u64,
        );

        let path = self.media.media_path(record.id, file_name);
        self.media.write_media(&path, bytes).await?;
        record.media_path = path.to_string_lossy().to_string();
        self.store.insert_record(&record)?;

        info!("Created record {} from direct upload", record.id);
        Ok(record)
    }

    /// Create a record by fetching remote media over http(s).
    #[instrument(skip(self))]
    pub async fn create_record_from_url(
        &self,
        owner_id: &str,
        source_url: &str,
        file_name: Option<&str>,
    ) -> Result<TranscriptionRecord> {
        let file_name = match file_name {
            Some(name) => name.to_string(),
            None => file_name_from_url(source_url),
        };

        let mut record = TranscriptionRecord::new(
            owner_id.to_string(),
            file_name.clone(),
            "application/octet-stream".to_string(),
            String::new(),
            0,
        );

        let path = self.media.media_path(record.id, &file_name);
        let total_bytes = self.media.fetch_remote(source_url, &path).await?;

        record.media_path = path.to_string_lossy().to_string();
        record.media_bytes = total_bytes;
        self.store.insert_record(&record)?;

        info!(
            "Created record {} from remote media ({} bytes)",
            record.id, total_bytes
        );
        Ok(record)
    }

    // ========================================================================
    // Pipeline steps
    // ========================================================================

    /// Run the transcription step. Oversized media continues in the background.
    #[instrument(skip(self))]
    pub async fn transcribe(&self, owner_id: &str, id: Uuid) -> Result<TranscriptionRecord> {
        self.owned_record(owner_id, id)?;

        let outcome = self.requester.transcribe_record(id).await?;
        if outcome.continuation_needed {
            self.jobs
                .submit(Job::ContinueTranscription { record_id: id })?;
        }

        Ok(outcome.record)
    }

    /// Run the transcription step and wait for any continuation inline.
    ///
    /// Used by the CLI, where there is no response to return early for.
    pub async fn transcribe_and_wait(
        &self,
        owner_id: &str,
        id: Uuid,
    ) -> Result<TranscriptionRecord> {
        self.owned_record(owner_id, id)?;

        let outcome = self.requester.transcribe_record(id).await?;
        if outcome.continuation_needed {
            self.requester.continue_transcription(id).await?;
        }

        self.get_record(owner_id, id)
    }

    /// Run the summary step.
    #[instrument(skip(self))]
    pub async fn summarize(&self, owner_id: &str, id: Uuid) -> Result<Summary> {
        let record = self.owned_record(owner_id, id)?;

        let transcript = record
            .transcript_text
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                InnsiktError::InvalidInput(format!("Record {} has no transcript yet", id))
            })?;

        if !self.store.claim_step(id, StepKind::Summary)? {
            return Err(InnsiktError::Conflict(format!(
                "Summary for {} is {}",
                id, record.summary_status
            )));
        }

        match self.summarizer.summarize(&transcript).await {
            Ok(summary) => {
                self.store.complete_summary(id, &summary.display_text())?;
                Ok(summary)
            }
            Err(e) => {
                self.store.fail_step(id, StepKind::Summary, &e.to_string())?;
                Err(e)
            }
        }
    }

    /// Run the analysis step.
    #[instrument(skip(self))]
    pub async fn analyze(&self, owner_id: &str, id: Uuid) -> Result<AnalysisData> {
        let record = self.owned_record(owner_id, id)?;

        let transcript = record
            .transcript_text
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                InnsiktError::InvalidInput(format!("Record {} has no transcript yet", id))
            })?;

        if !self.store.claim_step(id, StepKind::Analysis)? {
            return Err(InnsiktError::Conflict(format!(
                "Analysis for {} is {}",
                id, record.analysis_status
            )));
        }

        match self.analyzer.analyze(&transcript).await {
            Ok(analysis) => {
                let json = serde_json::to_string(&analysis)?;
                self.store.complete_analysis(id, &json)?;
                Ok(analysis)
            }
            Err(e) => {
                self.store
                    .fail_step(id, StepKind::Analysis, &e.to_string())?;
                Err(e)
            }
        }
    }

    /// Answer a chat message about a record.
    #[instrument(skip(self, messages))]
    pub async fn chat(
        &self,
        owner_id: &str,
        id: Uuid,
        messages: &[ChatMessage],
    ) -> Result<String> {
        let record = self.owned_record(owner_id, id)?;
        self.chat.reply(&record, messages).await
    }

    // ========================================================================
    // Queries and maintenance
    // ========================================================================

    /// Fetch a record, enforcing ownership.
    pub fn get_record(&self, owner_id: &str, id: Uuid) -> Result<TranscriptionRecord> {
        self.owned_record(owner_id, id)
    }

    /// List an owner's records.
    pub fn list_records(&self, owner_id: &str) -> Result<Vec<TranscriptionRecord>> {
        self.store.list_records(owner_id)
    }

    /// List every record (CLI administration).
    pub fn list_all_records(&self) -> Result<Vec<TranscriptionRecord>> {
        self.store.list_all_records()
    }

    /// Re-enqueue transcriptions a restart interrupted.
    pub fn resume_interrupted(&self) -> Result<usize> {
        let records = self.store.records_to_resume()?;
        let count = records.len();

        for record in records {
            info!(
                "Resuming transcription for {} from slice {}/{}",
                record.id, record.transcribed_slices, record.total_slices
            );
            self.jobs.submit(Job::ContinueTranscription {
                record_id: record.id,
            })?;
        }

        Ok(count)
    }

    /// Delete stale upload sessions and their staged chunks.
    pub async fn sweep_sessions(&self) -> Result<usize> {
        self.uploads.sweep_stale_sessions().await
    }

    /// Spawn the periodic session sweeper.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let orchestrator = self.clone();
        let interval = Duration::from_secs(self.settings.upload.sweep_interval_seconds.max(60));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so startup stays quiet.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match orchestrator.sweep_sessions().await {
                    Ok(0) => {}
                    Ok(n) => info!("Swept {} stale upload session(s)", n),
                    Err(e) => warn!("Session sweep failed: {}", e),
                }
            }
        })
    }

    fn owned_record(&self, owner_id: &str, id: Uuid) -> Result<TranscriptionRecord> {
        let record = self
            .store
            .get_record(id)?
            .ok_or_else(|| InnsiktError::NotFound(format!("Record {}", id)))?;

        if record.owner_id != owner_id {
            return Err(InnsiktError::Forbidden(format!(
                "Record {} belongs to another owner",
                id
            )));
        }

        Ok(record)
    }
}

/// Derive a file name from the last URL path segment.
fn file_name_from_url(source_url: &str) -> String {
    url::Url::parse(source_url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "download.bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://example.com/media/interview.mp3"),
            "interview.mp3"
        );
        assert_eq!(file_name_from_url("https://example.com/"), "download.bin");
        assert_eq!(file_name_from_url("not a url"), "download.bin");
    }
}

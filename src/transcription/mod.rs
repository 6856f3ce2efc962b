//! Transcription for Innsikt.
//!
//! Media at or below the direct-submit limit goes to the speech API in one
//! request. Oversized media degrades to byte slices: the leading slice is
//! transcribed inline, the rest by background continuation with a persisted
//! checkpoint.

mod requester;
mod whisper;

pub use requester::{TranscribeOutcome, TranscriptionRequester};
pub use whisper::WhisperTranscriber;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for speech-to-text services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a media file held in memory, returning plain text.
    ///
    /// `file_name` carries the extension the API uses to sniff the format.
    async fn transcribe_bytes(&self, file_name: &str, bytes: Vec<u8>) -> Result<String>;
}

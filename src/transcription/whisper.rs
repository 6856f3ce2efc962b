//! OpenAI Whisper transcription implementation.

use super::Transcriber;
use crate::error::{InnsiktError, Result};
use crate::openai::create_client_with_timeout;
use crate::retry::{with_retry, RetryConfig};
use async_openai::types::{AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// OpenAI Whisper-based transcriber.
pub struct WhisperTranscriber {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    retry: RetryConfig,
}

impl WhisperTranscriber {
    /// Create a transcriber with the given model, request budget, and retry policy.
    pub fn new(model: &str, request_timeout: Duration, retry: RetryConfig) -> Self {
        Self {
            client: create_client_with_timeout(request_timeout),
            model: model.to_string(),
            retry,
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    #[instrument(skip(self, bytes), fields(file_name = %file_name, len = bytes.len()))]
    async fn transcribe_bytes(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        debug!("Submitting media to speech API");

        let response = with_retry(&self.retry, || {
            let file_name = file_name.to_string();
            let bytes = bytes.clone();

            async move {
                let request = CreateTranscriptionRequestArgs::default()
                    .file(async_openai::types::AudioInput::from_vec_u8(
                        file_name, bytes,
                    ))
                    .model(&self.model)
                    .response_format(AudioResponseFormat::Json)
                    .build()
                    .map_err(|e| {
                        InnsiktError::Transcription(format!("Failed to build request: {}", e))
                    })?;

                self.client
                    .audio()
                    .transcribe(request)
                    .await
                    .map_err(|e| InnsiktError::OpenAI(format!("Whisper API error: {}", e)))
            }
        })
        .await?;

        debug!("Transcribed {} characters", response.text.len());
        Ok(response.text.trim().to_string())
    }
}

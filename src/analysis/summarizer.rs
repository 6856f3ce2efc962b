//! Transcript summarization.

use super::{is_placeholder_input, parse_llm_json, run_completion, string_array, truncate_transcript};
use crate::config::{Prompts, SummarySettings};
use crate::error::Result;
use crate::openai::create_client_with_timeout;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};

/// A generated summary.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Summary {
    pub text: String,
    pub key_points: Vec<String>,
}

impl Summary {
    /// Canned result for trivial or still-processing input.
    pub fn placeholder() -> Self {
        Self {
            text: "This appears to be a processing message or an empty transcript. \
                   Transcribe the interview before requesting a summary."
                .to_string(),
            key_points: Vec::new(),
        }
    }

    /// Build from any JSON value; missing or mistyped fields default.
    pub fn from_value(value: &Value) -> Self {
        Self {
            text: value
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            key_points: string_array(value.get("key_points")),
        }
    }

    /// The text stored on the record.
    pub fn display_text(&self) -> String {
        if self.key_points.is_empty() {
            return self.text.clone();
        }

        let mut out = self.text.clone();
        out.push_str("\n\nKey points:");
        for point in &self.key_points {
            out.push_str("\n- ");
            out.push_str(point);
        }
        out
    }
}

/// LLM-backed summarizer.
pub struct Summarizer {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_transcript_chars: usize,
    retry: RetryConfig,
    prompts: Prompts,
}

impl Summarizer {
    pub fn new(settings: &SummarySettings, retry: RetryConfig, prompts: Prompts) -> Self {
        Self {
            client: create_client_with_timeout(Duration::from_secs(
                settings.request_timeout_seconds,
            )),
            model: settings.model.clone(),
            max_transcript_chars: settings.max_transcript_chars,
            retry,
            prompts,
        }
    }

    /// Summarize a transcript.
    #[instrument(skip(self, transcript), fields(chars = transcript.len()))]
    pub async fn summarize(&self, transcript: &str) -> Result<Summary> {
        if is_placeholder_input(transcript) {
            info!("Transcript is trivial, returning placeholder summary");
            return Ok(Summary::placeholder());
        }

        let truncated = truncate_transcript(transcript, self.max_transcript_chars);

        let mut vars = HashMap::new();
        vars.insert("transcript".to_string(), truncated);

        let system = self
            .prompts
            .render_with_custom(&self.prompts.summary.system, &vars);
        let user = self
            .prompts
            .render_with_custom(&self.prompts.summary.user, &vars);

        let raw =
            run_completion(&self.client, &self.model, &self.retry, &system, &user).await?;

        Ok(Summary::from_value(&parse_llm_json(&raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_summarizer() -> Summarizer {
        Summarizer::new(
            &SummarySettings::default(),
            RetryConfig::default(),
            Prompts::default(),
        )
    }

    #[tokio::test]
    async fn test_trivial_transcript_short_circuits_without_api_call() {
        // "ok" is 2 characters; no network is reachable from this test,
        // so reaching the API would fail the test.
        let summary = test_summarizer().summarize("ok").await.unwrap();
        assert!(summary.text.starts_with("This appears to be a processing message"));
        assert!(summary.key_points.is_empty());
    }

    #[tokio::test]
    async fn test_processing_phrase_short_circuits() {
        let text = "Transcription in progress. Please check back later to see the \
                    full text of your uploaded interview recording.";
        let summary = test_summarizer().summarize(text).await.unwrap();
        assert!(summary.text.starts_with("This appears to be a processing message"));
    }

    #[test]
    fn test_from_value_backfills_missing_fields() {
        let summary = Summary::from_value(&serde_json::json!({ "unexpected": true }));
        assert_eq!(summary.text, "");
        assert!(summary.key_points.is_empty());

        let summary = Summary::from_value(&serde_json::json!({
            "text": "the gist",
            "key_points": ["a", "b"],
        }));
        assert_eq!(summary.text, "the gist");
        assert_eq!(summary.key_points.len(), 2);
    }

    #[test]
    fn test_display_text_includes_key_points() {
        let summary = Summary {
            text: "the gist".to_string(),
            key_points: vec!["exports are slow".to_string()],
        };

        let display = summary.display_text();
        assert!(display.starts_with("the gist"));
        assert!(display.contains("- exports are slow"));
    }
}

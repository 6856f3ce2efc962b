//! LLM-backed transcript analysis.
//!
//! Summarization and structured analysis share the same plumbing: a
//! placeholder short-circuit for trivial input, head/middle/tail truncation
//! for oversized transcripts, one chat completion, and a three-tier JSON
//! parse that always yields a structurally valid object.

mod analyzer;
mod summarizer;

pub use analyzer::{Analyzer, AnalysisData};
pub use summarizer::{Summarizer, Summary};

use crate::error::{InnsiktError, Result};
use crate::retry::{with_retry, RetryConfig};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

/// Transcripts shorter than this are treated as placeholders.
pub const PLACEHOLDER_MIN_CHARS: usize = 50;

/// Phrases that mark a transcript as a processing artifact, not content.
const PROCESSING_PHRASES: &[&str] = &[
    "transcription in progress",
    "still processing",
    "processing your file",
    "audio is being processed",
    "transcription pending",
];

const GAP_MARKER: &str = "\n[... transcript truncated ...]\n";

/// Whether the text is too trivial to send to the LLM.
///
/// Short texts and known "still processing" phrases get a canned result
/// without an API call.
pub fn is_placeholder_input(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < PLACEHOLDER_MIN_CHARS {
        return true;
    }

    let lowered = trimmed.to_lowercase();
    PROCESSING_PHRASES.iter().any(|p| lowered.contains(p))
}

/// Parse an LLM reply as JSON, falling back until something fits.
///
/// 1. Direct parse of the whole reply.
/// 2. Regex-extract the outermost `{...}` (models love surrounding prose).
/// 3. Wrap the raw reply as `{"text": ...}`.
pub fn parse_llm_json(raw: &str) -> Value {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return value;
        }
    }

    static OBJECT_RE: OnceLock<Regex> = OnceLock::new();
    let re = OBJECT_RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

    if let Some(m) = re.find(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(m.as_str()) {
            if value.is_object() {
                debug!("Recovered JSON object embedded in prose reply");
                return value;
            }
        }
    }

    serde_json::json!({ "text": trimmed })
}

/// Truncate a transcript to a character budget, keeping head, middle, and
/// tail slices with the gaps marked. Never splits a character.
pub fn truncate_transcript(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars || max_chars == 0 {
        return text.to_string();
    }

    let head_chars = max_chars / 2;
    let middle_chars = max_chars / 5;
    let tail_chars = max_chars - head_chars - middle_chars;

    let head: String = text.chars().take(head_chars).collect();
    let middle_start = total / 2 - middle_chars / 2;
    let middle: String = text.chars().skip(middle_start).take(middle_chars).collect();
    let tail: String = text.chars().skip(total - tail_chars).collect();

    format!("{head}{GAP_MARKER}{middle}{GAP_MARKER}{tail}")
}

/// Read a string array field, dropping anything that is not a string.
pub(crate) fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Run one chat completion and return the reply text.
pub(crate) async fn run_completion(
    client: &async_openai::Client<async_openai::config::OpenAIConfig>,
    model: &str,
    retry: &RetryConfig,
    system: &str,
    user: &str,
) -> Result<String> {
    let response = with_retry(retry, || async {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system.to_string())
                .build()
                .map_err(|e| InnsiktError::Analysis(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user.to_string())
                .build()
                .map_err(|e| InnsiktError::Analysis(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(0.2)
            .build()
            .map_err(|e| InnsiktError::Analysis(e.to_string()))?;

        client
            .chat()
            .create(request)
            .await
            .map_err(|e| InnsiktError::OpenAI(format!("Chat completion failed: {}", e)))
    })
    .await?;

    response
        .choices
        .first()
        .and_then(|c| c.message.content.as_ref())
        .map(|s| s.to_string())
        .ok_or_else(|| InnsiktError::Analysis("Empty response from LLM".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_placeholder() {
        assert!(is_placeholder_input("ok"));
        assert!(is_placeholder_input(""));
        assert!(is_placeholder_input("   short   "));
    }

    #[test]
    fn test_processing_phrase_is_placeholder() {
        let text = "Your transcription in progress, check back shortly. \
                    We will notify you when the audio file has been handled.";
        assert!(is_placeholder_input(text));
    }

    #[test]
    fn test_real_transcript_is_not_placeholder() {
        let text = "So the main problem we have with the current tool is that exporting \
                    reports takes forever and the numbers never match the dashboard.";
        assert!(!is_placeholder_input(text));
    }

    #[test]
    fn test_parse_valid_json() {
        let value = parse_llm_json(r#"{"text": "a summary", "key_points": ["one"]}"#);
        assert_eq!(value["text"], "a summary");
        assert_eq!(value["key_points"][0], "one");
    }

    #[test]
    fn test_parse_json_embedded_in_prose() {
        let raw = r#"Here is the analysis you asked for:

{"sentiment": "negative", "topics": ["exports"]}

Let me know if you need anything else."#;

        let value = parse_llm_json(raw);
        assert_eq!(value["sentiment"], "negative");
        assert_eq!(value["topics"][0], "exports");
    }

    #[test]
    fn test_parse_plain_prose_wraps() {
        let value = parse_llm_json("The interviewee was mostly unhappy.");
        assert_eq!(value["text"], "The interviewee was mostly unhappy.");
    }

    #[test]
    fn test_parse_non_object_json_wraps() {
        let value = parse_llm_json(r#"["a", "b"]"#);
        assert!(value.is_object());
        assert_eq!(value["text"], r#"["a", "b"]"#);
    }

    #[test]
    fn test_truncate_keeps_head_middle_tail() {
        let text: String = ('a'..='z').cycle().take(1000).collect();
        let truncated = truncate_transcript(&text, 100);

        assert!(truncated.len() < text.len());
        assert_eq!(truncated.matches("truncated").count(), 2);
        assert!(truncated.starts_with(&text[..50]));
        assert!(truncated.ends_with(&text[text.len() - 30..]));
    }

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate_transcript("short", 100), "short");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text: String = "å".repeat(200);
        let truncated = truncate_transcript(&text, 50);
        // Would panic on a byte-slicing implementation; also must stay valid UTF-8.
        assert!(truncated.contains('å'));
    }

    #[test]
    fn test_string_array_drops_non_strings() {
        let value = serde_json::json!({ "items": ["a", 1, "b", null] });
        assert_eq!(string_array(value.get("items")), vec!["a", "b"]);
        assert!(string_array(value.get("absent")).is_empty());
    }
}

//! Chat assistant over a processed interview.
//!
//! Stateless on the server: the caller resends the full conversation each
//! turn, the assistant builds one system message embedding the record's
//! artifacts and makes a single LLM call.

use crate::config::{ChatSettings, Prompts};
use crate::error::{InnsiktError, Result};
use crate::openai::create_client_with_timeout;
use crate::retry::{with_retry, RetryConfig};
use crate::store::{StepStatus, TranscriptionRecord};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::instrument;

const UNAVAILABLE: &str = "(not available yet)";

/// Who said a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of the caller-held conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// LLM-backed chat assistant.
pub struct ChatAssistant {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_history_messages: usize,
    retry: RetryConfig,
    prompts: Prompts,
}

impl ChatAssistant {
    pub fn new(settings: &ChatSettings, retry: RetryConfig, prompts: Prompts) -> Self {
        Self {
            client: create_client_with_timeout(Duration::from_secs(
                settings.request_timeout_seconds,
            )),
            model: settings.model.clone(),
            max_history_messages: settings.max_history_messages.max(1),
            retry,
            prompts,
        }
    }

    /// Answer the latest message in the conversation about this record.
    #[instrument(skip(self, record, messages), fields(record_id = %record.id))]
    pub async fn reply(
        &self,
        record: &TranscriptionRecord,
        messages: &[ChatMessage],
    ) -> Result<String> {
        if messages.is_empty() {
            return Err(InnsiktError::InvalidInput(
                "Conversation must contain at least one message".to_string(),
            ));
        }
        if messages.last().map(|m| m.role) != Some(ChatRole::User) {
            return Err(InnsiktError::InvalidInput(
                "Conversation must end with a user message".to_string(),
            ));
        }

        let system = self.build_system_message(record);

        let mut request_messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| InnsiktError::Chat(e.to_string()))?
                .into(),
        ];

        for message in trim_history(messages, self.max_history_messages) {
            let built: ChatCompletionRequestMessage = match message.role {
                ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(|e| InnsiktError::Chat(e.to_string()))?
                    .into(),
                ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(|e| InnsiktError::Chat(e.to_string()))?
                    .into(),
            };
            request_messages.push(built);
        }

        let response = with_retry(&self.retry, || {
            let request_messages = request_messages.clone();
            async move {
                let request = CreateChatCompletionRequestArgs::default()
                    .model(&self.model)
                    .messages(request_messages)
                    .temperature(0.7)
                    .build()
                    .map_err(|e| InnsiktError::Chat(e.to_string()))?;

                self.client
                    .chat()
                    .create(request)
                    .await
                    .map_err(|e| InnsiktError::OpenAI(format!("Chat completion failed: {}", e)))
            }
        })
        .await?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .map(|s| s.to_string())
            .ok_or_else(|| InnsiktError::Chat("Empty response from LLM".to_string()))
    }

    /// Embed the record's artifacts verbatim into the system prompt.
    ///
    /// Analysis is only embedded once its step completed; partial data is
    /// not to be trusted.
    fn build_system_message(&self, record: &TranscriptionRecord) -> String {
        let transcript = record
            .transcript_text
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNAVAILABLE.to_string());

        let summary = record
            .summary_text
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNAVAILABLE.to_string());

        let analysis = if record.analysis_status == StepStatus::Completed {
            record
                .analysis_json
                .clone()
                .unwrap_or_else(|| UNAVAILABLE.to_string())
        } else {
            UNAVAILABLE.to_string()
        };

        let mut vars = HashMap::new();
        vars.insert("file_name".to_string(), record.file_name.clone());
        vars.insert("transcript".to_string(), transcript);
        vars.insert("summary".to_string(), summary);
        vars.insert("analysis".to_string(), analysis);

        self.prompts
            .render_with_custom(&self.prompts.chat.system, &vars)
    }
}

/// Keep only the most recent messages.
fn trim_history(messages: &[ChatMessage], max: usize) -> &[ChatMessage] {
    if messages.len() <= max {
        messages
    } else {
        &messages[messages.len() - max..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_assistant(max_history: usize) -> ChatAssistant {
        ChatAssistant::new(
            &ChatSettings {
                max_history_messages: max_history,
                ..ChatSettings::default()
            },
            RetryConfig::default(),
            Prompts::default(),
        )
    }

    fn test_record() -> TranscriptionRecord {
        let mut record = TranscriptionRecord::new(
            "alice".to_string(),
            "call.mp3".to_string(),
            "audio/mpeg".to_string(),
            "/data/media/x.mp3".to_string(),
            450,
        );
        record.transcript_text = Some("We talked about exports.".to_string());
        record.summary_text = Some("Exports are slow.".to_string());
        record.analysis_json = Some(r#"{"sentiment":"negative"}"#.to_string());
        record
    }

    fn user(content: &str) -> ChatMessage {
        ChatMessage {
            role: ChatRole::User,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_system_message_embeds_artifacts() {
        let assistant = test_assistant(20);
        let mut record = test_record();
        record.analysis_status = StepStatus::Completed;

        let system = assistant.build_system_message(&record);
        assert!(system.contains("call.mp3"));
        assert!(system.contains("We talked about exports."));
        assert!(system.contains("Exports are slow."));
        assert!(system.contains(r#""sentiment":"negative""#));
    }

    #[test]
    fn test_incomplete_analysis_is_not_embedded() {
        let assistant = test_assistant(20);
        let record = test_record(); // analysis_status is still pending

        let system = assistant.build_system_message(&record);
        assert!(!system.contains("negative"));
        assert!(system.contains(UNAVAILABLE));
    }

    #[test]
    fn test_missing_artifacts_render_as_unavailable() {
        let assistant = test_assistant(20);
        let mut record = test_record();
        record.transcript_text = None;
        record.summary_text = None;

        let system = assistant.build_system_message(&record);
        assert!(system.matches(UNAVAILABLE).count() >= 3);
    }

    #[test]
    fn test_trim_history_keeps_most_recent() {
        let messages: Vec<ChatMessage> =
            (0..10).map(|i| user(&format!("message {}", i))).collect();

        let trimmed = trim_history(&messages, 4);
        assert_eq!(trimmed.len(), 4);
        assert_eq!(trimmed[0].content, "message 6");
        assert_eq!(trimmed[3].content, "message 9");

        assert_eq!(trim_history(&messages, 20).len(), 10);
    }

    #[tokio::test]
    async fn test_reply_rejects_bad_conversations() {
        let assistant = test_assistant(20);
        let record = test_record();

        let err = assistant.reply(&record, &[]).await.unwrap_err();
        assert!(matches!(err, InnsiktError::InvalidInput(_)));

        let history = vec![ChatMessage {
            role: ChatRole::Assistant,
            content: "hello".to_string(),
        }];
        let err = assistant.reply(&record, &history).await.unwrap_err();
        assert!(matches!(err, InnsiktError::InvalidInput(_)));
    }
}

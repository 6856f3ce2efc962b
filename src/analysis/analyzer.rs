//! Sentiment and topic analysis of transcripts.

use super::{is_placeholder_input, parse_llm_json, run_completion, string_array, truncate_transcript};
use crate::config::{AnalysisSettings, Prompts};
use crate::error::Result;
use crate::openai::create_client_with_timeout;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};

/// Structured analysis of one interview.
///
/// Every field defaults, so the shape is valid even when the LLM reply was
/// unusable and the content is semantically empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisData {
    pub sentiment: String,
    pub sentiment_explanation: String,
    pub pain_points: Vec<String>,
    pub feature_requests: Vec<String>,
    pub topics: Vec<String>,
}

impl Default for AnalysisData {
    fn default() -> Self {
        Self {
            sentiment: "neutral".to_string(),
            sentiment_explanation: String::new(),
            pain_points: Vec::new(),
            feature_requests: Vec::new(),
            topics: Vec::new(),
        }
    }
}

impl AnalysisData {
    /// Canned result for trivial or still-processing input.
    pub fn placeholder() -> Self {
        Self {
            sentiment_explanation: "This appears to be a processing message or an empty \
                                    transcript; no analysis was performed."
                .to_string(),
            ..Self::default()
        }
    }

    /// Build from any JSON value; missing or mistyped fields default.
    pub fn from_value(value: &Value) -> Self {
        Self {
            sentiment: value
                .get("sentiment")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or("neutral")
                .to_string(),
            sentiment_explanation: value
                .get("sentiment_explanation")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            pain_points: string_array(value.get("pain_points")),
            feature_requests: string_array(value.get("feature_requests")),
            topics: string_array(value.get("topics")),
        }
    }
}

/// LLM-backed analyzer.
pub struct Analyzer {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_transcript_chars: usize,
    retry: RetryConfig,
    prompts: Prompts,
}

impl Analyzer {
    pub fn new(settings: &AnalysisSettings, retry: RetryConfig, prompts: Prompts) -> Self {
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

    /// Analyze a transcript.
    #[instrument(skip(self, transcript), fields(chars = transcript.len()))]
    pub async fn analyze(&self, transcript: &str) -> Result<AnalysisData> {
        if is_placeholder_input(transcript) {
            info!("Transcript is trivial, returning placeholder analysis");
            return Ok(AnalysisData::placeholder());
        }

        let truncated = truncate_transcript(transcript, self.max_transcript_chars);

        let mut vars = HashMap::new();
        vars.insert("transcript".to_string(), truncated);

        let system = self
            .prompts
            .render_with_custom(&self.prompts.analysis.system, &vars);
        let user = self
            .prompts
            .render_with_custom(&self.prompts.analysis.user, &vars);

        let raw =
            run_completion(&self.client, &self.model, &self.retry, &system, &user).await?;

        Ok(AnalysisData::from_value(&parse_llm_json(&raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_analyzer() -> Analyzer {
        Analyzer::new(
            &AnalysisSettings::default(),
            RetryConfig::default(),
            Prompts::default(),
        )
    }

    #[tokio::test]
    async fn test_trivial_transcript_short_circuits_without_api_call() {
        let analysis = test_analyzer().analyze("ok").await.unwrap();
        assert_eq!(analysis.sentiment, "neutral");
        assert!(analysis
            .sentiment_explanation
            .starts_with("This appears to be a processing message"));
        assert!(analysis.pain_points.is_empty());
    }

    #[test]
    fn test_from_value_backfills_neutral_defaults() {
        let analysis = AnalysisData::from_value(&serde_json::json!({}));
        assert_eq!(analysis.sentiment, "neutral");
        assert!(analysis.topics.is_empty());

        // A wrapped-prose fallback object also yields a valid shape.
        let analysis =
            AnalysisData::from_value(&parse_llm_json("the user sounded frustrated"));
        assert_eq!(analysis.sentiment, "neutral");
        assert!(analysis.pain_points.is_empty());
    }

    #[test]
    fn test_from_value_reads_full_schema() {
        let analysis = AnalysisData::from_value(&serde_json::json!({
            "sentiment": "negative",
            "sentiment_explanation": "Repeated complaints about exports.",
            "pain_points": ["slow exports"],
            "feature_requests": ["CSV export"],
            "topics": ["reporting"],
        }));

        assert_eq!(analysis.sentiment, "negative");
        assert_eq!(analysis.pain_points, vec!["slow exports"]);
        assert_eq!(analysis.feature_requests, vec!["CSV export"]);
        assert_eq!(analysis.topics, vec!["reporting"]);
    }

    #[test]
    fn test_analysis_round_trips_through_json() {
        let analysis = AnalysisData {
            sentiment: "mixed".to_string(),
            sentiment_explanation: "Likes the product, hates the pricing.".to_string(),
            pain_points: vec!["pricing".to_string()],
            feature_requests: Vec::new(),
            topics: vec!["pricing".to_string()],
        };

        let json = serde_json::to_string(&analysis).unwrap();
        let parsed: AnalysisData = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sentiment, "mixed");
        assert_eq!(parsed.pain_points, vec!["pricing"]);
    }
}

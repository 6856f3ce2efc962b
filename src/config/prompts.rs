//! Prompt templates for Innsikt.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub summary: SummaryPrompts,
    pub analysis: AnalysisPrompts,
    pub chat: ChatPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}


/// Prompts for transcript summarization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryPrompts {
    pub system: String,
    pub user: String,
}

impl Default for SummaryPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an analyst who summarizes user interview transcripts for product teams.

When summarizing:
1. Capture what the interviewee actually said, not what the interviewer asked
2. Preserve concrete details: product names, workflows, numbers
3. Note strong reactions (frustration, enthusiasm) where they are explicit
4. Ignore greetings, scheduling talk, and other non-content

Respond with a JSON object:
{"text": "<the summary, 3-6 sentences>", "key_points": ["<point>", ...]}

Output only the JSON object."#
                .to_string(),

            user: r#"Summarize this interview transcript.

Transcript:
{{transcript}}

Respond with a JSON object containing "text" (a 3-6 sentence summary) and "key_points" (an array of the most important takeaways)."#
                .to_string(),
        }
    }
}

/// Prompts for sentiment and topic analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisPrompts {
    pub system: String,
    pub user: String,
}

impl Default for AnalysisPrompts {
    fn default() -> Self {
        Self {
            system: r#"You analyze user interview transcripts and extract structured product insights.

Respond with a JSON object with exactly these fields:
- "sentiment": one of "positive", "neutral", "negative", "mixed"
- "sentiment_explanation": one sentence explaining the sentiment
- "pain_points": array of problems the interviewee described, in their own framing
- "feature_requests": array of capabilities the interviewee asked for or implied wanting
- "topics": array of short topic labels covered in the conversation

Rules:
- Base every item on something actually said in the transcript
- Use an empty array when a category has no evidence
- Output only the JSON object, no prose"#
                .to_string(),

            user: r#"Analyze this interview transcript.

Transcript:
{{transcript}}

Return the JSON object described in the system prompt."#
                .to_string(),
        }
    }
}

/// Prompt for the chat assistant over a processed interview.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatPrompts {
    pub system: String,
}

impl Default for ChatPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an assistant helping a user explore one processed interview. You have the transcript, an AI-generated summary, and a structured analysis.

Interview file: {{file_name}}

Transcript:
{{transcript}}

Summary:
{{summary}}

Analysis:
{{analysis}}

Guidelines:
- Answer only from the material above; say so plainly when it does not cover the question
- Quote the transcript when the exact wording matters
- Keep answers concise and specific to this interview"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        // Store custom variables
        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            // Load summary prompts if file exists
            let summary_path = custom_path.join("summary.toml");
            if summary_path.exists() {
                let content = std::fs::read_to_string(&summary_path)?;
                prompts.summary = toml::from_str(&content)?;
            }

            // Load analysis prompts if file exists
            let analysis_path = custom_path.join("analysis.toml");
            if analysis_path.exists() {
                let content = std::fs::read_to_string(&analysis_path)?;
                prompts.analysis = toml::from_str(&content)?;
            }

            // Load chat prompts if file exists
            let chat_path = custom_path.join("chat.toml");
            if chat_path.exists() {
                let content = std::fs::read_to_string(&chat_path)?;
                prompts.chat = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        // Start with custom variables, then override with provided vars
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(!prompts.summary.system.is_empty());
        assert!(!prompts.analysis.system.is_empty());
        assert!(!prompts.chat.system.is_empty());
    }

    #[test]
    fn test_render_template() {
        let template = "Summarize {{file_name}} ({{count}} slices).";
        let mut vars = std::collections::HashMap::new();
        vars.insert("file_name".to_string(), "call.mp3".to_string());
        vars.insert("count".to_string(), "4".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Summarize call.mp3 (4 slices).");
    }

    #[test]
    fn test_custom_variables_are_overridden_by_provided() {
        let mut prompts = Prompts::default();
        prompts
            .variables
            .insert("transcript".to_string(), "from config".to_string());

        let mut vars = std::collections::HashMap::new();
        vars.insert("transcript".to_string(), "from call".to_string());

        let result = prompts.render_with_custom("{{transcript}}", &vars);
        assert_eq!(result, "from call");
    }
}

//! Configuration settings for Innsikt.

use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub upload: UploadSettings,
    pub transcription: TranscriptionSettings,
    pub summary: SummarySettings,
    pub analysis: AnalysisSettings,
    pub chat: ChatSettings,
    pub retry: RetryConfig,
    pub prompts: PromptSettings,
}


/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data (database, media objects).
    pub data_dir: String,
    /// Directory for staging uploaded chunks.
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.innsikt".to_string(),
            temp_dir: "/tmp/innsikt".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// An API key mapping a bearer token to an owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    /// The bearer token presented by clients.
    pub token: String,
    /// Owner id recorded on everything this key creates.
    pub owner: String,
}

/// API authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct AuthSettings {
    /// Accepted API keys. With no keys configured every request is rejected.
    pub keys: Vec<ApiKey>,
}


impl AuthSettings {
    /// Resolve a bearer token to its owner id.
    pub fn owner_for_token(&self, token: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|k| k.token == token)
            .map(|k| k.owner.as_str())
    }
}

/// Chunked upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Maximum size of a single chunk in bytes.
    pub max_chunk_bytes: u64,
    /// Maximum chunks a session may declare.
    pub max_chunks: u32,
    /// Sessions idle longer than this are swept along with their chunks.
    pub session_ttl_seconds: u64,
    /// How often the sweeper runs.
    pub sweep_interval_seconds: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_chunk_bytes: 4 * 1024 * 1024,
            max_chunks: 512,
            session_ttl_seconds: 24 * 3600,
            sweep_interval_seconds: 3600,
        }
    }
}

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Speech model to use.
    pub model: String,
    /// Media at or below this size is transcribed in one request.
    pub direct_limit_bytes: u64,
    /// Slice size for oversized media.
    pub slice_bytes: u64,
    /// Wall-clock budget per speech API request.
    pub request_timeout_seconds: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
            direct_limit_bytes: 10 * 1024 * 1024,
            slice_bytes: 8 * 1024 * 1024,
            request_timeout_seconds: 600,
        }
    }
}

/// Summarization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarySettings {
    /// LLM model for summaries.
    pub model: String,
    /// Wall-clock budget per summary request.
    pub request_timeout_seconds: u64,
    /// Transcript character budget before head/middle/tail truncation.
    pub max_transcript_chars: usize,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            request_timeout_seconds: 120,
            max_transcript_chars: 24_000,
        }
    }
}

/// Sentiment/topic analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// LLM model for analysis.
    pub model: String,
    /// Wall-clock budget per analysis request.
    pub request_timeout_seconds: u64,
    /// Transcript character budget before head/middle/tail truncation.
    pub max_transcript_chars: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            request_timeout_seconds: 120,
            max_transcript_chars: 24_000,
        }
    }
}

/// Chat assistant settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// LLM model for chat replies.
    pub model: String,
    /// Wall-clock budget per chat request.
    pub request_timeout_seconds: u64,
    /// Only the most recent messages of the submitted history are forwarded.
    pub max_history_messages: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            request_timeout_seconds: 120,
            max_history_messages: 20,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}


impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::InnsiktError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("innsikt")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded chunk staging directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir().join("innsikt.db")
    }

    /// Get the media object directory.
    pub fn media_dir(&self) -> PathBuf {
        self.data_dir().join("media")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let settings = Settings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.port, settings.server.port);
        assert_eq!(parsed.transcription.model, settings.transcription.model);
    }

    #[test]
    fn test_owner_for_token() {
        let auth = AuthSettings {
            keys: vec![ApiKey {
                token: "secret-1".to_string(),
                owner: "alice".to_string(),
            }],
        };

        assert_eq!(auth.owner_for_token("secret-1"), Some("alice"));
        assert_eq!(auth.owner_for_token("wrong"), None);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [server]
            port = 9999
            "#,
        )
        .unwrap();

        assert_eq!(settings.server.port, 9999);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.transcription.direct_limit_bytes, 10 * 1024 * 1024);
    }
}

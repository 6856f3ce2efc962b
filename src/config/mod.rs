//! Configuration module for Innsikt.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AnalysisPrompts, ChatPrompts, Prompts, SummaryPrompts};
pub use settings::{
    AnalysisSettings, ApiKey, AuthSettings, ChatSettings, GeneralSettings, PromptSettings,
    ServerSettings, Settings, SummarySettings, TranscriptionSettings, UploadSettings,
};

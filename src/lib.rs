//! Innsikt - Interview Transcription and Analysis
//!
//! A self-hosted service for turning recorded interviews into searchable,
//! analyzed text. The name "Innsikt" comes from the Norwegian word for
//! "insight."
//!
//! # Overview
//!
//! Innsikt allows you to:
//! - Upload audio/video interviews in chunks and reassemble them reliably
//! - Transcribe media through a speech-to-text API, with degraded slice
//!   processing for oversized files
//! - Generate AI summaries and structured sentiment analysis
//! - Chat with an assistant grounded in one interview's transcript and insights
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt template management
//! - `auth` - Bearer-token authentication for the HTTP API
//! - `store` - SQLite persistence for records and upload sessions
//! - `media` - Chunk staging and media object storage
//! - `upload` - Chunk receipt and upload finalization
//! - `transcription` - Speech-to-text with slice continuation
//! - `analysis` - LLM summarization and sentiment analysis
//! - `chat` - Chat assistant over processed interviews
//! - `jobs` - Background worker for transcription continuations
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use innsikt::config::Settings;
//! use innsikt::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     // Process a small media file end to end
//!     let record = orchestrator
//!         .create_record("local", "call.mp3", "audio/mpeg", &std::fs::read("call.mp3")?)
//!         .await?;
//!     let record = orchestrator.transcribe_and_wait("local", record.id).await?;
//!     println!("{}", record.transcript_text.unwrap_or_default());
//!
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod auth;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod media;
pub mod openai;
pub mod orchestrator;
pub mod retry;
pub mod store;
pub mod transcription;
pub mod upload;

pub use error::{InnsiktError, Result};

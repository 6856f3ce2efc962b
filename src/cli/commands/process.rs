//! Process command - run the full pipeline on a local file.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::path::Path;

/// Owner id recorded for records created from the local CLI.
const LOCAL_OWNER: &str = "local";

/// Run the process command.
pub async fn run_process(file: &str, transcript_only: bool, settings: Settings) -> Result<()> {
    preflight::check(Operation::Process)?;

    let path = Path::new(file);
    if !path.is_file() {
        anyhow::bail!("File not found: {}", file);
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.bin")
        .to_string();
    let bytes = std::fs::read(path)?;

    let orchestrator = Orchestrator::new(settings)?;

    Output::header(&format!("Processing {}", file_name));
    println!();

    eprintln!("  Creating record ({} bytes)...", bytes.len());
    let record = orchestrator
        .create_record(LOCAL_OWNER, &file_name, mime_for(&file_name), &bytes)
        .await?;

    eprintln!("  Transcribing...");
    let record = orchestrator
        .transcribe_and_wait(LOCAL_OWNER, record.id)
        .await?;

    let transcript = record.transcript_text.clone().unwrap_or_default();
    Output::success(&format!(
        "Transcription complete ({} characters)",
        transcript.len()
    ));
    println!();
    println!("{}", transcript);

    if transcript_only {
        Output::kv("Record", &record.id.to_string());
        return Ok(());
    }

    eprintln!("  Generating summary and analysis...");
    let (summary, analysis) = futures::join!(
        orchestrator.summarize(LOCAL_OWNER, record.id),
        orchestrator.analyze(LOCAL_OWNER, record.id),
    );

    match summary {
        Ok(summary) => {
            Output::header("Summary");
            println!();
            println!("{}", summary.display_text());
        }
        Err(e) => Output::error(&format!("Summary failed: {}", e)),
    }

    match analysis {
        Ok(analysis) => {
            Output::header("Analysis");
            println!();
            Output::kv("Sentiment", &analysis.sentiment);
            if !analysis.sentiment_explanation.is_empty() {
                Output::kv("Why", &analysis.sentiment_explanation);
            }
            print_items("Pain points", &analysis.pain_points);
            print_items("Feature requests", &analysis.feature_requests);
            print_items("Topics", &analysis.topics);
        }
        Err(e) => Output::error(&format!("Analysis failed: {}", e)),
    }

    println!();
    Output::kv("Record", &record.id.to_string());

    Ok(())
}

fn print_items(label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("  {}:", label);
    for item in items {
        Output::list_item(item);
    }
}

/// Best-effort MIME type from the file extension.
fn mime_for(file_name: &str) -> &'static str {
    match Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("call.MP3"), "audio/mpeg");
        assert_eq!(mime_for("clip.webm"), "video/webm");
        assert_eq!(mime_for("unknown.xyz"), "application/octet-stream");
    }
}

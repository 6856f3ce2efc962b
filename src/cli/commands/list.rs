//! List command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    preflight::check(Operation::List)?;

    let orchestrator = Orchestrator::new(settings)?;

    match orchestrator.list_all_records() {
        Ok(records) => {
            if records.is_empty() {
                Output::info(
                    "No records yet. Use 'innsikt process <file>' or the HTTP API to add one.",
                );
            } else {
                Output::header(&format!("Records ({})", records.len()));
                println!();

                for record in &records {
                    Output::record_info(
                        &record.file_name,
                        &record.id.to_string(),
                        &format!(
                            "transcription {}, summary {}, analysis {}",
                            record.status, record.summary_status, record.analysis_status
                        ),
                        record.media_bytes,
                    );
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list records: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}

//! The `say` command: record one turn.

use anyhow::{Context, Result};
use colored::Colorize;
use mnemo_sdk::{CompressOutcome, IndexingStatus, Mnemo, TurnReport};

/// Record a message and report what the engine did with it.
pub async fn say(mnemo: &Mnemo, session_id: &str, role: &str, text: &str) -> Result<()> {
    let report = mnemo
        .record_message(session_id, role, text)
        .await
        .context("Failed to record message")?;

    for line in describe(&report) {
        println!("{}", line);
    }
    Ok(())
}

fn describe(report: &TurnReport) -> Vec<String> {
    let state = &report.state;
    let mut lines = vec![format!(
        "{} Recorded in {} ({} buffered)",
        "✓".green(),
        state.session_id.cyan(),
        state.recent_messages().len()
    )];

    match &report.compression {
        Ok(CompressOutcome::Skipped) => {}
        Ok(CompressOutcome::Compressed {
            position,
            messages,
            indexing,
        }) => {
            lines.push(format!(
                "{} Compressed {} messages into summary #{}",
                "✓".green(),
                messages,
                position
            ));
            if let IndexingStatus::Failed(e) = indexing {
                lines.push(format!(
                    "{} Summary not indexed: {} (run `mnemo reindex {}`)",
                    "!".yellow(),
                    e,
                    state.session_id
                ));
            }
        }
        Err(e) => lines.push(format!("{} Compression failed: {}", "✗".red(), e)),
    }

    match &report.consolidation {
        Ok(0) => {}
        Ok(moved) => lines.push(format!(
            "{} Consolidated {} summaries into long-term memory",
            "✓".green(),
            moved
        )),
        Err(e) => lines.push(format!("{} Consolidation failed: {}", "✗".red(), e)),
    }

    lines
}

//! Memory commands: compress, consolidate, reindex and recall.

use anyhow::{Context, Result};
use colored::Colorize;
use mnemo_sdk::{CompressOutcome, IndexingStatus, Mnemo, Recall};

use super::{format_time, truncate};

/// Compress the session's buffered messages.
pub async fn compress(mnemo: &Mnemo, session_id: &str, force: bool) -> Result<()> {
    let outcome = mnemo
        .compress(session_id, force)
        .await
        .context("Failed to compress session")?;

    match outcome {
        CompressOutcome::Skipped => {
            println!(
                "{} Nothing to compress (use --force to summarize below the threshold)",
                "-".dimmed()
            );
        }
        CompressOutcome::Compressed {
            position,
            messages,
            indexing,
        } => {
            println!(
                "{} Compressed {} messages into summary #{}",
                "✓".green(),
                messages,
                position
            );
            if let IndexingStatus::Failed(e) = indexing {
                println!("{} Summary not indexed: {}", "!".yellow(), e);
            }
        }
    }
    Ok(())
}

/// Move due summaries into long-term memory.
pub async fn consolidate(mnemo: &Mnemo, session_id: &str) -> Result<()> {
    let moved = mnemo
        .consolidate(session_id)
        .await
        .context("Failed to consolidate session")?;

    if moved == 0 {
        println!("{} No summaries due for consolidation", "-".dimmed());
    } else {
        println!(
            "{} Consolidated {} summaries into long-term memory",
            "✓".green(),
            moved
        );
    }
    Ok(())
}

/// Index summaries missing from the vector index.
pub async fn reindex(mnemo: &Mnemo, session_id: &str) -> Result<()> {
    let indexed = mnemo
        .reindex(session_id)
        .await
        .context("Failed to reindex session")?;
    println!("{} Indexed {} summaries", "✓".green(), indexed);
    Ok(())
}

/// Retrieve memory relevant to a query.
pub async fn recall(mnemo: &Mnemo, session_id: &str, query: &str, json: bool) -> Result<()> {
    let recall = mnemo
        .recall(session_id, query)
        .await
        .context("Failed to recall memory")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recall)?);
    } else {
        for line in render(&recall) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn render(recall: &Recall) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(reason) = &recall.degraded {
        lines.push(format!("{} Retrieval degraded: {}", "!".yellow(), reason));
    }

    lines.push(format!("{}", "Short-term summaries".bold()));
    if recall.summaries.is_empty() {
        lines.push(format!("  {}", "none".dimmed()));
    }
    for hit in &recall.summaries {
        lines.push(format!(
            "  [{:.3}] #{} {} {}",
            hit.score,
            hit.position,
            format_time(hit.summary.timestamp).dimmed(),
            truncate(&hit.summary.content, 100)
        ));
    }

    lines.push(format!("{}", "Long-term memory".bold()));
    if recall.long_term.is_empty() {
        lines.push(format!("  {}", "none".dimmed()));
    }
    for hit in &recall.long_term {
        lines.push(format!(
            "  [{:.3}] {} batch {} {}",
            hit.score,
            hit.session_id.cyan(),
            hit.batch,
            format_time(hit.memory.timestamp).dimmed()
        ));
        for summary in &hit.memory.summaries {
            lines.push(format!("      {}", truncate(&summary.content, 96)));
        }
    }

    lines
}

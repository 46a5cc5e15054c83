//! Session commands.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use mnemo_sdk::{ChatState, Mnemo};
use serde::Serialize;

use super::{format_time, truncate};
use crate::cli::{SessionAction, SessionCommand};

/// One line of `session list --json`.
#[derive(Debug, Serialize)]
struct SessionListing {
    session_id: String,
    recent_messages: usize,
    summaries: usize,
    long_term_batches: usize,
    update_time: i64,
}

impl From<&ChatState> for SessionListing {
    fn from(state: &ChatState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            recent_messages: state.recent_messages().len(),
            summaries: state.summaries().len(),
            long_term_batches: state.long_term_memory.len(),
            update_time: state.update_time,
        }
    }
}

/// Execute session command.
pub async fn execute(cmd: SessionCommand, mnemo: &Mnemo) -> Result<()> {
    match cmd.action {
        SessionAction::Create { session_id } => create(mnemo, session_id).await,
        SessionAction::Show { session_id, json } => show(mnemo, &session_id, json),
        SessionAction::List { json } => list(mnemo, json),
        SessionAction::Set {
            session_id,
            intent,
            topic,
            prefs,
        } => set(mnemo, &session_id, intent, topic, prefs).await,
    }
}

async fn create(mnemo: &Mnemo, session_id: Option<String>) -> Result<()> {
    let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let state = mnemo
        .create_session(&session_id)
        .await
        .context("Failed to create session")?;

    println!("{} Created session {}", "✓".green(), state.session_id.cyan());
    Ok(())
}

fn show(mnemo: &Mnemo, session_id: &str, json: bool) -> Result<()> {
    let Some(state) = mnemo.session(session_id).context("Failed to load session")? else {
        bail!("Session not found: {}", session_id);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    println!("{} {}", "Session".bold(), state.session_id.cyan());
    println!("  Updated: {}", format_time(state.update_time));
    if !state.intent.is_empty() {
        println!("  Intent:  {}", state.intent);
    }
    if !state.topic.is_empty() {
        println!("  Topic:   {}", state.topic);
    }
    for (key, value) in &state.preference {
        println!("  Pref:    {} = {}", key, value);
    }

    println!();
    println!("{} ({})", "Recent messages".bold(), state.recent_messages().len());
    for message in state.recent_messages() {
        println!("  {:>9}: {}", message.role.to_string().yellow(), truncate(&message.content, 100));
    }

    println!();
    println!("{} ({})", "Short-term summaries".bold(), state.summaries().len());
    for (i, summary) in state.summaries().iter().enumerate() {
        println!(
            "  #{} {} {}",
            state.summary_position(i),
            format_time(summary.timestamp).dimmed(),
            truncate(&summary.content, 100)
        );
    }

    println!();
    println!("{} ({} batches)", "Long-term memory".bold(), state.long_term_memory.len());
    for (batch, memory) in state.long_term_memory.iter().enumerate() {
        println!(
            "  batch {} {} ({} summaries)",
            batch,
            format_time(memory.timestamp).dimmed(),
            memory.summaries.len()
        );
    }
    Ok(())
}

fn list(mnemo: &Mnemo, json: bool) -> Result<()> {
    let ids = mnemo.list_sessions().context("Failed to list sessions")?;
    let mut listings = Vec::with_capacity(ids.len());
    for id in &ids {
        if let Some(state) = mnemo.session(id)? {
            listings.push(SessionListing::from(&state));
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    if listings.is_empty() {
        println!("{}", "No sessions".dimmed());
        return Ok(());
    }

    for s in &listings {
        println!(
            "{}  {} recent, {} summaries, {} batches  {}",
            s.session_id.cyan(),
            s.recent_messages,
            s.summaries,
            s.long_term_batches,
            format_time(s.update_time).dimmed()
        );
    }
    Ok(())
}

/// Parse `key=value`; the value is JSON when it parses, a string otherwise.
fn parse_pref(raw: &str) -> Result<(String, serde_json::Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Invalid preference '{}': expected key=value", raw);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid preference '{}': empty key", raw);
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

async fn set(
    mnemo: &Mnemo,
    session_id: &str,
    intent: Option<String>,
    topic: Option<String>,
    prefs: Vec<String>,
) -> Result<()> {
    let prefs = prefs
        .iter()
        .map(|p| parse_pref(p))
        .collect::<Result<Vec<_>>>()?;

    if intent.is_none() && topic.is_none() && prefs.is_empty() {
        bail!("Nothing to set: pass --intent, --topic or --pref");
    }

    mnemo
        .update(session_id, |sessions, state| {
            if let Some(intent) = &intent {
                sessions.set_intent(state, intent);
            }
            if let Some(topic) = &topic {
                sessions.set_topic(state, topic);
            }
            for (key, value) in prefs {
                sessions.set_preference(state, &key, value);
            }
            Ok(())
        })
        .await
        .context("Failed to update session")?;

    println!("{} Updated session {}", "✓".green(), session_id.cyan());
    Ok(())
}

//! Persisted session CLI commands: list and clear.

use anyhow::{Context, Result};
use chrono::Utc;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use serde::Serialize;

use turnstile_core::session::{WarmEntry, WarmStore};
use turnstile_types::session::{PersistedRecord, SessionKey};

use crate::cli::context::CliContext;

#[derive(Debug, Serialize)]
struct ListedSession {
    #[serde(flatten)]
    record: PersistedRecord,
    expired: bool,
}

#[derive(Debug, Serialize)]
struct Listing {
    sessions: Vec<ListedSession>,
    unreadable: Vec<String>,
}

/// List persisted sessions with their age and expiry status.
///
/// With `quiet`, only the table is printed.
///
/// # Examples
///
/// ```bash
/// turnstile sessions list
/// turnstile sessions list --json
/// ```
pub async fn list_sessions(ctx: &CliContext, json: bool, quiet: bool) -> Result<()> {
    let entries = ctx
        .warm_store()
        .scan()
        .await
        .with_context(|| format!("Failed to read {}", ctx.sessions_dir.display()))?;

    let now = Utc::now();
    let ttl = ctx.config.warm_ttl();
    let mut listing = Listing {
        sessions: Vec::new(),
        unreadable: Vec::new(),
    };
    for entry in entries {
        match entry {
            WarmEntry::Record { record, .. } => {
                let expired = record.is_expired(now, ttl);
                listing.sessions.push(ListedSession { record, expired });
            }
            WarmEntry::Corrupt { location } => listing.unreadable.push(location),
        }
    }
    listing
        .sessions
        .sort_by(|a, b| a.record.key().cmp(&b.record.key()));
    listing.unreadable.sort();

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if listing.sessions.is_empty() && listing.unreadable.is_empty() {
        if quiet {
            return Ok(());
        }
        println!();
        println!(
            "  {} No persisted sessions in {}",
            style("i").blue().bold(),
            style(ctx.sessions_dir.display()).cyan()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Room").fg(Color::White),
        Cell::new("Persona").fg(Color::White),
        Cell::new("Turns").fg(Color::White),
        Cell::new("Last used").fg(Color::White),
        Cell::new("Idle").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);

    for listed in &listing.sessions {
        let record = &listed.record;
        let status_cell = if listed.expired {
            Cell::new("expired").fg(Color::DarkGrey)
        } else if record.resume_token.is_empty() {
            Cell::new("no token").fg(Color::Yellow)
        } else {
            Cell::new("resumable").fg(Color::Green)
        };

        table.add_row(vec![
            Cell::new(record.room_id.to_string()).fg(Color::White),
            Cell::new(&record.persona_id).fg(Color::Cyan),
            Cell::new(record.turn_count.to_string()).fg(Color::White),
            Cell::new(record.last_used.format("%Y-%m-%d %H:%M").to_string()).fg(Color::White),
            Cell::new(format_duration(now - record.last_used)).fg(Color::DarkGrey),
            status_cell,
        ]);
    }

    if quiet {
        if !listing.sessions.is_empty() {
            println!("{table}");
        }
        return Ok(());
    }

    println!();
    println!(
        "  Persisted sessions in {}",
        style(ctx.sessions_dir.display()).cyan().bold()
    );
    println!();
    println!("{table}");
    println!();
    println!(
        "  {} session{}",
        style(listing.sessions.len()).bold(),
        if listing.sessions.len() == 1 { "" } else { "s" }
    );
    if !listing.unreadable.is_empty() {
        println!(
            "  {} {} unreadable file{} (removed by {})",
            style("!").yellow().bold(),
            listing.unreadable.len(),
            if listing.unreadable.len() == 1 { "" } else { "s" },
            style("turnstile sweep").yellow()
        );
    }
    println!();

    Ok(())
}

/// Delete one persisted session, or every one after confirmation.
///
/// # Examples
///
/// ```bash
/// turnstile sessions clear --room 1 --persona finance
/// turnstile sessions clear --force
/// ```
pub async fn clear_sessions(
    ctx: &CliContext,
    key: Option<SessionKey>,
    force: bool,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let store = ctx.store();

    if let Some(key) = key {
        let cleared = store.clear_key(&key).await?;
        if json {
            println!(
                "{}",
                serde_json::json!({"key": key, "cleared": cleared})
            );
        } else if !quiet {
            if cleared {
                println!("  {} Session {} cleared.", style("x").red().bold(), style(&key).cyan());
            } else {
                println!("  {} No session {} to clear.", style("i").blue().bold(), style(&key).cyan());
            }
        }
        return Ok(());
    }

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete every persisted session in {}?",
                style(ctx.sessions_dir.display()).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            if !quiet {
                println!("  Cancelled.");
            }
            return Ok(());
        }
    }

    let report = store.clear_all().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !quiet {
        println!(
            "  {} Cleared {} session{}{}.",
            style("x").red().bold(),
            report.cleared,
            if report.cleared == 1 { "" } else { "s" },
            if report.discarded > 0 {
                format!(" and {} unreadable file(s)", report.discarded)
            } else {
                String::new()
            }
        );
    }

    Ok(())
}

// --- Formatting helpers ---

fn format_duration(duration: chrono::TimeDelta) -> String {
    let secs = duration.num_seconds().max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86_400, (secs % 86_400) / 3600)
    }
}

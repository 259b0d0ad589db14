//! One-off warm-tier sweep.

use anyhow::Result;
use console::style;

use turnstile_core::session::Reaper;

use crate::cli::context::CliContext;

/// Delete expired and unreadable persisted sessions.
///
/// Uses the same sweep the gateway's reaper runs on its warm interval.
pub async fn sweep(ctx: &CliContext, json: bool, quiet: bool) -> Result<()> {
    let removed = Reaper::new(ctx.store()).sweep_warm().await;

    if json {
        println!("{}", serde_json::json!({ "removed": removed }));
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    if removed == 0 {
        println!("  {} Nothing to sweep.", style("✓").green());
    } else {
        println!(
            "  {} Removed {} persisted session{}.",
            style("x").red().bold(),
            removed,
            if removed == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};
    use turnstile_core::session::WarmStore;
    use turnstile_types::config::GatewayConfig;
    use turnstile_types::session::{PersistedRecord, SessionKey};

    #[tokio::test]
    async fn sweep_removes_only_expired_records() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = CliContext {
            data_dir: dir.path().to_path_buf(),
            config: GatewayConfig {
                session_ttl_secs: 3600,
                ..GatewayConfig::default()
            },
            sessions_dir: dir.path().join("sessions"),
        };
        let warm = ctx.warm_store();
        let record = |room_id: i64, age: TimeDelta| {
            let at = Utc::now() - age;
            PersistedRecord {
                resume_token: "tok".to_string(),
                room_id,
                persona_id: "finance".to_string(),
                last_used: at,
                created_at: at,
                turn_count: 1,
            }
        };
        warm.save(&record(1, TimeDelta::hours(2))).await.unwrap();
        warm.save(&record(2, TimeDelta::minutes(2))).await.unwrap();

        sweep(&ctx, true, false).await.unwrap();

        assert!(warm.load(&SessionKey::new(1, "finance")).await.unwrap().is_none());
        assert!(warm.load(&SessionKey::new(2, "finance")).await.unwrap().is_some());

        // Nothing left to remove; a quiet rerun succeeds silently.
        sweep(&ctx, false, true).await.unwrap();
        assert!(warm.load(&SessionKey::new(2, "finance")).await.unwrap().is_some());
    }
}

//! Show the effective configuration.

use anyhow::Result;
use console::style;
use serde::Serialize;

use turnstile_types::config::GatewayConfig;

use crate::cli::context::CliContext;

#[derive(Debug, Serialize)]
struct ConfigView<'a> {
    data_dir: String,
    sessions_dir: String,
    config: &'a GatewayConfig,
}

/// Print resolved paths and the configuration after defaults are applied.
pub fn show_config(ctx: &CliContext, json: bool) -> Result<()> {
    if json {
        let view = ConfigView {
            data_dir: ctx.data_dir.display().to_string(),
            sessions_dir: ctx.sessions_dir.display().to_string(),
            config: &ctx.config,
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!();
    println!("  {}   {}", style("Data dir").bold(), style(ctx.data_dir.display()).cyan());
    println!(
        "  {}   {}",
        style("Sessions").bold(),
        style(ctx.sessions_dir.display()).cyan()
    );
    println!();
    for line in toml::to_string_pretty(&ctx.config)?.lines() {
        println!("  {line}");
    }
    println!(
        "  {}",
        style(format!("# effective warm TTL: {}s", ctx.config.warm_ttl().as_secs())).dim()
    );
    println!();
    Ok(())
}

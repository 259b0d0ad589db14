//! Turnstile maintenance CLI entry point.
//!
//! Binary name: `turnstile`
//!
//! Parses CLI arguments, resolves the data directory and configuration, then
//! dispatches to the command handler.

mod cli;

use clap::Parser;
use clap_complete::generate;
use turnstile_observe::{LogFormat, TracingOptions, init_tracing, shutdown_tracing};
use turnstile_types::session::SessionKey;

use cli::context::CliContext;
use cli::{Cli, Commands, SessionsCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,turnstile=debug,turnstile_core=debug,turnstile_infra=debug,turnstile_api=debug",
        _ => "trace",
    };
    init_tracing(&TracingOptions {
        default_directive: filter.to_string(),
        format: if cli.log_json {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        },
        enable_otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need the data directory
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "turnstile", &mut std::io::stdout());
        return Ok(());
    }

    let ctx = CliContext::init().await;

    let result = match cli.command {
        Commands::Sessions { action } => match action {
            SessionsCommand::List => {
                cli::sessions::list_sessions(&ctx, cli.json, cli.quiet).await
            }
            SessionsCommand::Clear {
                room,
                persona,
                force,
            } => {
                let key = room.zip(persona).map(|(room, persona)| SessionKey::new(room, persona));
                cli::sessions::clear_sessions(&ctx, key, force, cli.json, cli.quiet).await
            }
        },

        Commands::Sweep => cli::sweep::sweep(&ctx, cli.json, cli.quiet).await,

        Commands::Config => cli::config::show_config(&ctx, cli.json),

        Commands::Completions { .. } => unreachable!("handled above"),
    };

    shutdown_tracing();
    result
}

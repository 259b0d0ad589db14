//! CLI command definitions for the `turnstile` binary.
//!
//! The binary maintains the warm tier without a running gateway: inspect and
//! clear persisted sessions, run a one-off expiry sweep, and show the
//! effective configuration. A running gateway is managed through its admin
//! API instead.

pub mod config;
pub mod context;
pub mod sessions;
pub mod sweep;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Inspect and maintain persisted chat sessions.
#[derive(Parser)]
#[command(name = "turnstile", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress status messages and log output below errors. Listings print
    /// their table only.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "TURNSTILE_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect or clear persisted sessions.
    #[command(alias = "session")]
    Sessions {
        #[command(subcommand)]
        action: SessionsCommand,
    },

    /// Delete expired and unreadable persisted sessions once.
    Sweep,

    /// Show the effective configuration and resolved paths.
    Config,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SessionsCommand {
    /// List persisted sessions.
    #[command(alias = "ls")]
    List,

    /// Delete one persisted session, or all of them.
    Clear {
        /// Room of the session to clear.
        #[arg(long, requires = "persona", allow_negative_numbers = true)]
        room: Option<i64>,

        /// Persona of the session to clear.
        #[arg(long, requires = "room")]
        persona: Option<String>,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn clear_requires_room_and_persona_together() {
        assert!(Cli::try_parse_from(["turnstile", "sessions", "clear", "--room", "1"]).is_err());
        let cli = Cli::try_parse_from([
            "turnstile", "sessions", "clear", "--room", "-100", "--persona", "finance", "--force",
        ])
        .unwrap();
        match cli.command {
            Commands::Sessions {
                action:
                    SessionsCommand::Clear {
                        room,
                        persona,
                        force,
                    },
            } => {
                assert_eq!(room, Some(-100));
                assert_eq!(persona.as_deref(), Some("finance"));
                assert!(force);
            }
            _ => panic!("expected sessions clear"),
        }
    }

    #[test]
    fn quiet_is_global() {
        let cli = Cli::try_parse_from(["turnstile", "sessions", "list", "--quiet"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn global_flags_apply_to_subcommands() {
        let cli = Cli::try_parse_from(["turnstile", "sweep", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }
}

//! Conduit CLI - mode-switching assistant with on-demand skills.
//!
//! `conduit chat` opens an interactive session, `conduit ask` answers one
//! query, and `conduit skills` lists the capability bundles that discovery
//! finds under the skills root.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use conduit_config::{Config, LoadOptions};
use conduit_core::OperatingMode;
use conduit_runtime::config_bridge;
use conduit_telemetry::{LogConfig, LogFormat, setup_logging};

mod app;
mod commands;
mod render;
mod repl;
mod theme;

use commands::{ask, chat, skills};

/// Conduit - mode-switching assistant with on-demand skills
#[derive(Parser)]
#[command(name = "conduit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file merged over the user and workspace layers
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Text file to index for retrieval (repeatable)
    #[arg(long = "docs", global = true, value_name = "PATH")]
    docs: Vec<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Initial mode (chat, rag, auto, agent)
        #[arg(short, long)]
        mode: Option<OperatingMode>,
    },

    /// Answer a single query and exit
    Ask {
        /// Mode for this query (chat, rag, auto, agent)
        #[arg(short, long)]
        mode: Option<OperatingMode>,

        /// Print the execution trace as JSON
        #[arg(long)]
        trace: bool,

        /// The query; a leading directive such as `/rag` is honored
        #[arg(required = true, trailing_var_arg = true)]
        query: Vec<String>,
    },

    /// List discovered skills
    Skills {
        /// Skills root (defaults to the configured root)
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let workspace_root =
        std::env::current_dir().context("Failed to determine the current directory")?;
    let loaded = Config::load_with(&LoadOptions {
        workspace_root: Some(&workspace_root),
        home_override: None,
        explicit_file: cli.config.as_deref(),
    });

    // Set up logging from config, with --verbose override.
    let log_config = match &loaded {
        Ok(resolved) => {
            let mut lc = config_bridge::to_log_config(&resolved.config);
            if cli.verbose {
                "debug".clone_into(&mut lc.level);
            }
            lc
        },
        Err(_) => {
            let level = if cli.verbose { "debug" } else { "warn" };
            LogConfig::new(level).with_format(LogFormat::Compact)
        },
    };
    let _log_guard = match setup_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        },
    };

    let resolved = loaded.context("Failed to load configuration")?;
    let config = resolved.config;

    match cli.command {
        Some(Commands::Chat { mode }) => {
            let app = app::App::build(&config, &workspace_root, &cli.docs)?;
            chat::run_chat(&app, mode).await?;
        },
        Some(Commands::Ask { mode, trace, query }) => {
            let app = app::App::build(&config, &workspace_root, &cli.docs)?;
            ask::run_ask(&app, mode, trace, &query.join(" ")).await?;
        },
        Some(Commands::Skills { root }) => {
            let root = root.unwrap_or_else(|| config_bridge::skills_root(&config, &workspace_root));
            skills::list_skills(&root)?;
        },
        None => {
            // Default to chat mode.
            let app = app::App::build(&config, &workspace_root, &cli.docs)?;
            chat::run_chat(&app, None).await?;
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ask_parses_mode_and_query() {
        let cli = Cli::parse_from(["conduit", "--docs", "a.md", "ask", "--mode", "rag", "how", "long?"]);
        assert_eq!(cli.docs, vec![PathBuf::from("a.md")]);
        let Some(Commands::Ask { mode, query, trace }) = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(mode, Some(OperatingMode::Rag));
        assert_eq!(query, vec!["how", "long?"]);
        assert!(!trace);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(Cli::try_parse_from(["conduit", "ask", "--mode", "hybrid", "q"]).is_err());
    }
}

//! CLI interface for Relay
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for running the router agent.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Relay multi-agent query router
///
/// Routes each query through translation, conversation memory, web search
/// and answer synthesis agents, degrading gracefully when any of them fail.
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the router agent HTTP service
    Serve,

    /// Run one query through the pipeline and print the answer
    Ask {
        /// The query to answer
        query: String,

        /// Also print the intermediate pipeline state
        #[arg(long)]
        trace: bool,
    },

    /// Check that every downstream agent publishes its agent card
    Agents,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print the configuration file location
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["relay", "serve"]);
        assert!(matches!(cli.command, Command::Serve));
        assert!(!cli.json);
        assert!(cli.log.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["relay", "--json", "--log", "debug", "agents"]);
        assert!(cli.json);
        assert_eq!(cli.log, Some("debug".to_string()));
    }

    #[test]
    fn test_ask_command() {
        let cli = Cli::parse_from(["relay", "ask", "Quel temps fait-il?", "--trace"]);
        if let Command::Ask { query, trace } = cli.command {
            assert_eq!(query, "Quel temps fait-il?");
            assert!(trace);
        } else {
            panic!("Expected Ask command");
        }
    }

    #[test]
    fn test_config_show() {
        let cli = Cli::parse_from(["relay", "--config", "/tmp/relay.toml", "config", "show"]);
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Show
            }
        ));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/relay.toml")));
    }
}

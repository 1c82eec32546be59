// Relay
// Main entry point for the relay binary

use clap::Parser;
use relay_engine::cli::{Cli, Command, ConfigAction};
use relay_engine::config::Config;
use relay_engine::handlers::{
    handle_agents, handle_ask, handle_config_path, handle_config_show, handle_serve, OutputFormat,
};
use relay_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };
    let config = if cli.config.is_some() {
        Config::load_from_path(&config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("Relay v{} ({} - {})", version, commit, timestamp);

    // Handle commands
    match cli.command {
        Command::Serve => {
            tracing::info!("Starting router agent on {}", config.server.bind_addr());
            handle_serve(&config).await
        }

        Command::Ask { query, trace } => handle_ask(query, trace, &config, format).await,

        Command::Agents => handle_agents(&config, format).await,

        Command::Config { action } => match action {
            ConfigAction::Show => handle_config_show(&config, format),
            ConfigAction::Path => handle_config_path(&config_path, format),
        },
    }
}

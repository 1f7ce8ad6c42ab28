//! OpenClaw gateway command-line client.

pub mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use openclaw_client::config::{http_to_ws, vars, DEFAULT_GATEWAY_URL};
use openclaw_client::ClientConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Client id the CLI announces unless overridden.
pub const CLI_CLIENT_ID: &str = "gateway-client";

/// OpenClaw - gateway client
#[derive(Parser)]
#[command(name = "openclaw")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to a JSON5 client config file
    #[arg(short, long, env = "OPENCLAW_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Gateway URL (http(s) URLs are rewritten to ws(s))
    #[arg(long, env = vars::OPENCLAW_GATEWAY_URL, global = true)]
    pub url: Option<String>,

    /// Gateway auth token
    #[arg(long, env = vars::OPENCLAW_TOKEN, hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Client id announced in the handshake
    #[arg(long, global = true)]
    pub client_id: Option<String>,

    /// Per-request timeout in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Connect and show the gateway handshake
    Hello,

    /// Call a gateway method
    Call(commands::call::CallArgs),

    /// Print gateway events until interrupted
    Listen(commands::listen::ListenArgs),

    /// Show version information
    Version,
}

impl Cli {
    /// Client configuration from the config file and command-line options.
    ///
    /// Options (and their environment variables) override file values.
    pub fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ClientConfig::new(http_to_ws(DEFAULT_GATEWAY_URL), "")
                .with_client_id(CLI_CLIENT_ID),
        };

        if let Some(url) = &self.url {
            config.gateway_url = http_to_ws(url);
        }
        if let Some(token) = &self.token {
            config.token = token.clone().into();
        }
        if let Some(id) = &self.client_id {
            config = config.with_client_id(id.clone());
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_request_timeout(Duration::from_millis(ms));
        }

        config.validate()?;
        Ok(config)
    }
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Hello => commands::hello::run(cli.client_config()?).await,
        Commands::Call(args) => commands::call::run(cli.client_config()?, args).await,
        Commands::Listen(args) => commands::listen::run(cli.client_config()?, args).await,
        Commands::Version => {
            println!("openclaw {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use tictac_relay::config::{self, FileConfig, Profile, RelayConfig};
use tictac_relay::{AppState, build_router};

#[derive(Parser)]
#[command(name = "tictac-relay")]
#[command(about = "Room relay for two-player tic-tac-toe over WebSocket")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (defaults to ./tictac.toml, ignored if missing)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay in the foreground
    Serve(ServeArgs),

    /// Print the resolved configuration as TOML
    Config(ConfigArgs),
}

#[derive(Parser, Default)]
struct ServeArgs {
    /// Port to listen on (0 = auto-select)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Configuration preset
    #[arg(long, value_enum)]
    profile: Option<Profile>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Parser)]
struct ConfigArgs {
    /// Configuration preset
    #[arg(long, value_enum)]
    profile: Option<Profile>,
}

fn resolve_file_config(path: Option<PathBuf>, profile: Option<&Profile>) -> Result<FileConfig> {
    let path = path.unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_FILE));
    config::load_config(&path, profile)
        .extract()
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config(args)) => {
            let fc = resolve_file_config(cli.config, args.profile.as_ref())?;
            let rendered = toml::to_string_pretty(&fc).context("Failed to render configuration")?;
            print!("{}", rendered);
            Ok(())
        }
        Some(Commands::Serve(args)) => run_server(args, cli.config).await,
        None => run_server(ServeArgs::default(), cli.config).await,
    }
}

async fn run_server(args: ServeArgs, config_path: Option<PathBuf>) -> Result<()> {
    // Setup logging
    let default_directive = if args.debug {
        "tictac_relay=debug,tower_http=debug,info"
    } else {
        "tictac_relay=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let mut fc = resolve_file_config(config_path, args.profile.as_ref())?;
    // CLI flags sit above every figment layer
    if let Some(host) = args.host {
        fc.server.host = Some(host);
    }
    if let Some(port) = args.port {
        fc.server.port = port;
    }
    let relay_config = RelayConfig::from_file(&fc)?;
    let addr = relay_config.bind_addr;

    let app = build_router(AppState::new(relay_config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    // Scripts read the bound address from stdout
    println!("RELAY_ADDR={}", actual_addr);
    info!("Tic-tac-toe relay listening on ws://{}", actual_addr);
    info!("  GET /, /ws       - Game WebSocket");
    info!("  GET /health      - Health status");
    info!("  GET /metrics     - Server metrics");

    let shutdown_signal = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal, closing listener..."),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

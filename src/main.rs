// src/main.rs
// Truckin relay - tool-call proxy for the trucking assistant

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use truckin::{
    ToolProxy,
    channel::ChannelState,
    config::ProxyConfig,
    http,
    llm::OpenAiClassifier,
};

#[derive(Parser)]
#[command(name = "truckin")]
#[command(about = "Routes chat messages to tool calls on a stdio tool executor")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.truckin/config.toml when present)
    #[arg(short, long, global = true, env = "TRUCKIN_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Spawn the tool executor and serve the HTTP front door (default)
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the effective tool catalog as JSON
    Catalog,

    /// Validate the configuration and exit
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<ProxyConfig> {
    let mut config = ProxyConfig::load(path.map(PathBuf::as_path))?;
    config.apply_env();
    Ok(config)
}

async fn run_server(mut config: ProxyConfig, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }

    let validation = config.validate();
    for warning in &validation.warnings {
        warn!("{}", warning);
    }
    if !validation.is_valid() {
        bail!("Invalid configuration:\n{}", validation);
    }

    let classifier = Arc::new(OpenAiClassifier::new(&config.classifier));
    let proxy = Arc::new(ToolProxy::start(&config, classifier).await?);

    // Crash watcher: the proxy keeps answering 503 once the executor is gone
    if let Some(mut states) = proxy.subscribe() {
        tokio::spawn(async move {
            if states.wait_for(|s| *s == ChannelState::Crashed).await.is_ok() {
                error!("Tool executor crashed; restart the relay to recover");
            }
        });
    }

    let app = http::create_router(Arc::clone(&proxy));
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        addr = %addr,
        tools = proxy.catalog().len(),
        timeout_ms = config.correlator.timeout_ms,
        "Truckin relay listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    proxy.shutdown().await;
    info!("Truckin relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        None => run_server(config, None).await?,
        Some(Commands::Serve { port }) => run_server(config, port).await?,
        Some(Commands::Catalog) => {
            println!("{}", serde_json::to_string_pretty(&config.catalog())?);
        }
        Some(Commands::CheckConfig) => {
            let validation = config.validate();
            println!("{}", validation);
            if !validation.is_valid() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

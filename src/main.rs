//! MedQuery-RS: biomedical query routing and orchestration service
//!
//! This is the main entry point for the application.

use anyhow::{bail, Result};
use medquery_rs::{
    cache::CacheManager,
    config::{self, Settings},
    decision::DecisionAgent,
    network::HttpClient,
    orchestrator::Orchestrator,
    sources::SourceLoader,
    web::{create_router, AppState},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// What the command line asked for
enum Command {
    Serve { config: Option<PathBuf> },
    Help,
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = match parse_args(std::env::args().skip(1))? {
        Command::Serve { config } => config,
        Command::Help => {
            print_usage();
            return Ok(());
        }
        Command::Version => {
            println!("medquery-rs {}", medquery_rs::VERSION);
            return Ok(());
        }
    };

    let settings = config::load(config_path.as_deref())?;
    init_logging(&settings);

    info!("Starting MedQuery-RS v{}", medquery_rs::VERSION);
    info!("Loaded configuration for instance: {}", settings.general.instance_name);

    let state = build_state(settings.clone()).await?;
    let app = create_router(state);

    let addr = SocketAddr::new(settings.server.bind_address.parse()?, settings.server.port);
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// `RUST_LOG` wins; otherwise info, or debug when enabled in settings
fn init_logging(settings: &Settings) {
    let default = if settings.general.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Wire clients, limiters, cache and orchestrator together
async fn build_state(settings: Settings) -> Result<AppState> {
    let client = HttpClient::with_settings(&settings.outgoing)?;
    info!("HTTP client initialized");

    let registry = SourceLoader::load(&settings, &client)?;
    let limiters = SourceLoader::limiters(&settings);
    info!("Configured {} rate limiters", limiters.len());

    let cache = CacheManager::from_settings(&settings.cache).await;

    let orchestrator = Orchestrator::new(
        settings.orchestrator.clone(),
        DecisionAgent::new(),
        Arc::new(limiters),
        Arc::new(cache),
        Arc::new(registry),
    );

    Ok(AppState::new(settings, orchestrator))
}

fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut config = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => match args.next() {
                Some(path) => config = Some(PathBuf::from(path)),
                None => bail!("{} requires a path", arg),
            },
            "-h" | "--help" => return Ok(Command::Help),
            "-V" | "--version" => return Ok(Command::Version),
            other => bail!("unknown argument: {} (see --help)", other),
        }
    }

    Ok(Command::Serve { config })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Print usage information
fn print_usage() {
    println!(
        r#"
MedQuery-RS v{}
Query routing and multi-source orchestration for biomedical data sources

USAGE:
    medquery-rs [OPTIONS]

OPTIONS:
    -c, --config <FILE>     Path to configuration file
    -h, --help              Print help information
    -V, --version           Print version information

ENVIRONMENT VARIABLES:
    MEDQUERY_SETTINGS_PATH  Path to settings.yml
    MEDQUERY_DEBUG          Enable debug logging (true/false)
    MEDQUERY_PORT           Server port
    MEDQUERY_BIND_ADDRESS   Bind address
    REDIS_URL               Durable cache URL (in-process cache only when unset)
    NCBI_API_KEY            PubMed E-utilities API key
    OPENFDA_API_KEY         openFDA API key
    RUST_LOG                Log filter (overrides MEDQUERY_DEBUG)
"#,
        medquery_rs::VERSION
    );
}

//! MathRPC server
//!
//! Loads configuration, wires the solver, headline provider and cache, then
//! serves requests until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use mathrpc_core::{
    services::{remote::RemoteConfig, solver::MIN_CREDENTIAL_LEN},
    CacheStore, Dispatcher, FileCacheStore, GeminiClient, ProblemSolver, RemoteModel, RpcServer, ServerConfig,
    UolNewsProvider,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(name = "mathrpc")]
#[command(about = "Calculator RPC server with persistent result cache", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./mathrpc.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind host (overrides configuration)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides configuration)
    #[arg(short, long)]
    port: Option<u16>,

    /// Cache file (overrides configuration)
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// Cache size limit in bytes (overrides configuration)
    #[arg(long)]
    cache_limit: Option<u64>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref());
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(cache_file) = cli.cache_file {
        config.cache_file = cache_file;
    }
    if let Some(limit) = cli.cache_limit {
        config.cache_limit_bytes = limit;
    }

    let log_level = if config.debug { "debug" } else { cli.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // Logs go to stderr; stdout stays free for the banner.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("Configuration loaded: {}:{}", config.host, config.port);

    let solver_config = config.solver_config();
    let remote: Option<Arc<dyn RemoteModel>> = if solver_config.credential_valid() {
        match GeminiClient::new(RemoteConfig {
            api_key: config.remote_api_key.clone(),
            timeout: config.connection_timeout(),
        }) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Remote solver disabled: {}", e);
                None
            }
        }
    } else {
        if solver_config.credential_configured() {
            warn!(
                "Remote API key shorter than {} characters, remote solver disabled",
                MIN_CREDENTIAL_LEN
            );
        } else {
            info!("No remote API key configured, using local solver only");
        }
        None
    };
    let remote_enabled = remote.is_some();
    let solver = Arc::new(ProblemSolver::new(solver_config, remote));

    let news = Arc::new(UolNewsProvider::new(
        config.news_url.clone(),
        &config.user_agent,
        config.connection_timeout(),
    )
    .context("Failed to initialize headline provider")?);

    let dispatcher = Dispatcher::new(solver, news, config.default_headline_count);
    let cache = FileCacheStore::load(config.cache_file.clone(), config.cache_limit_bytes).await;

    let addr = config.addr();
    let listener = RpcServer::<FileCacheStore>::bind(&addr)
        .await
        .with_context(|| format!("Cannot listen on {}", addr))?;

    println!("MathRPC server listening on {}", addr);
    println!(
        "  cache: {} ({} entries, limit {} bytes)",
        config.cache_file.display(),
        cache.len(),
        config.cache_limit_bytes
    );
    println!(
        "  remote solver: {}",
        if remote_enabled {
            config.remote_model.as_str()
        } else {
            "disabled"
        }
    );

    let mut server = RpcServer::new(dispatcher, cache);
    let stats = server.serve(listener).await.context("RPC server failed")?;
    info!("Served {} requests ({} from cache)", stats.requests, stats.cache_hits);

    Ok(())
}

//! MathRPC command-line client
//!
//! ```text
//! mathrpc-client potencia 2 10
//! mathrpc-client math_problem_solver "quanto é 7 * 8"
//! mathrpc-client ultimas_noticias 3
//! ```
//!
//! Exits with status 2 when no server answers and 1 on any other failure.

use clap::Parser;
use mathrpc_core::{Arg, MathRpcError, RpcClient, ServerConfig};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(name = "mathrpc-client")]
#[command(about = "Call a MathRPC server", long_about = None)]
#[command(version)]
struct Cli {
    /// Server address (defaults to the configured host:port)
    #[arg(short, long, env = "MATHRPC_ADDR")]
    addr: Option<String>,

    /// Connect and response timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Operation name (soma, subtracao, produto, divisao, fatorial, potencia,
    /// raiz_quadrada, ultimas_noticias, math_problem_solver)
    operation: String,

    /// Arguments; numeric tokens are sent as numbers, anything else as text
    #[arg(allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = ServerConfig::load(None);
    let addr = cli.addr.unwrap_or_else(|| config.addr());
    let timeout = cli
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.connection_timeout());

    let args: Vec<Arg> = cli.args.iter().map(|token| Arg::from_token(token)).collect();
    let mut client = RpcClient::new(addr, timeout);

    match client.call(&cli.operation, args).await {
        Ok(result) => {
            println!("{}", result);
            ExitCode::SUCCESS
        }
        Err(MathRpcError::ServerNotFound(detail)) => {
            eprintln!("Servidor não encontrado: {}", detail);
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("Erro: {}", e);
            ExitCode::FAILURE
        }
    }
}

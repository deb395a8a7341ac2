//! Engram server
//!
//! HTTP API by default; --stdio switches to the MCP transport so any
//! agent host can speak to the store over stdin/stdout.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use engram::error::Result;
use engram::http;
use engram::mcp::{EngramHandler, McpServer};
use engram::storage::Storage;
use engram::types::Config;

#[derive(Parser, Debug)]
#[command(name = "engram-server")]
#[command(about = "Engram memory server (HTTP API or MCP stdio)")]
#[command(version)]
struct Args {
    /// Data directory holding engram.db
    #[arg(long, env = "ENGRAM_DATA_DIR", default_value = "~/.engram")]
    data_dir: String,

    /// HTTP API port
    #[arg(long, env = "ENGRAM_PORT", default_value_t = 7437)]
    port: u16,

    /// Serve MCP over stdio instead of the HTTP API
    #[arg(long)]
    stdio: bool,
}

fn main() -> Result<()> {
    // Logging goes to stderr: stdout belongs to the MCP protocol.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = Config {
        data_dir: PathBuf::from(shellexpand::tilde(&args.data_dir).into_owned()),
        http_port: args.port,
        ..Config::default()
    };
    let storage = Storage::open(config)?;

    if args.stdio {
        tracing::info!("Engram MCP server starting on stdio...");
        let server = McpServer::new(EngramHandler::new(storage));
        return server.run();
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(http::serve(storage, args.port))
}

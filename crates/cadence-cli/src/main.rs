mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "cadence", version, about = "Habit tracking service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run and inspect the REST server.
    Server {
        #[command(subcommand)]
        command: ServerCommands,
    },
}

#[derive(Subcommand)]
enum ServerCommands {
    /// Start the REST server.
    Start {
        /// Override the bind host (default from CADENCE_BIND_HOST or 127.0.0.1).
        #[arg(long)]
        host: Option<String>,
        /// Override the REST port (default from CADENCE_REST_PORT or 9620).
        #[arg(long)]
        port: Option<u16>,
        /// Override the data directory (default from CADENCE_DATA_DIR or "data").
        #[arg(long)]
        data_dir: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Server { command } => match command {
            ServerCommands::Start {
                host,
                port,
                data_dir,
            } => commands::server::start(host, port, data_dir).await,
        },
    }
}

//! kwcluster entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kwcluster::{run_server, ClusteringMethod, Config, DetailLevel};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;

/// kwcluster: keyword topic clustering
#[derive(Parser, Debug)]
#[command(name = "kwcluster")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cluster keywords from a CSV/TSV file
    Cluster {
        /// Keyword file (CSV, TSV or semicolon separated)
        file: PathBuf,
        /// Detail level: coarse, balanced, fine (or thấp, trung bình, cao)
        #[arg(short, long)]
        level: Option<DetailLevel>,
        /// Minimum keywords per cluster
        #[arg(short, long)]
        min_cluster_size: Option<usize>,
        /// Clustering method: semantic or serp
        #[arg(long, default_value = "semantic")]
        method: ClusteringMethod,
        /// CSV output path (default: clustering_result_<timestamp>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Show pipeline logs
        #[arg(short, long)]
        verbose: bool,
    },
    /// Run the HTTP API with background workers
    Serve {
        /// Bind address. If not specified, uses config file value.
        #[arg(long)]
        host: Option<String>,
        /// HTTP port. If not specified, uses config file value.
        #[arg(short, long)]
        port: Option<u16>,
        /// Enable JSON logging format
        #[arg(long)]
        json_logs: bool,
    },
    /// Manage API keys
    Keys {
        #[command(subcommand)]
        action: KeysCommand,
    },
}

/// API key subcommands
#[derive(Subcommand, Debug, Clone)]
enum KeysCommand {
    /// Create a new API key for a client
    Create {
        /// Client or partner name
        client: String,
    },
    /// List all API keys
    List,
    /// Revoke every key of a client
    Revoke {
        /// Client name
        client: String,
    },
}

fn load_config(path: &Option<String>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    Ok(config.with_env_overrides())
}

fn init_cli_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn init_server_logging(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Cluster {
            file,
            level,
            min_cluster_size,
            method,
            output,
            verbose,
        } => {
            init_cli_logging(verbose);
            let config = load_config(&args.config)?;
            let options = cli::ClusterOptions {
                file,
                level,
                min_cluster_size,
                method,
                output,
            };
            cli::run_cluster(config, options, args.json).await
        }
        Command::Serve {
            host,
            port,
            json_logs,
        } => {
            init_server_logging(json_logs);
            tracing::info!("Starting kwcluster v{}", env!("CARGO_PKG_VERSION"));

            let mut config = load_config(&args.config)?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            run_server(config).await?;
            Ok(())
        }
        Command::Keys { action } => {
            init_cli_logging(false);
            let config = load_config(&args.config)?;
            match action {
                KeysCommand::Create { client } => cli::run_keys_create(&config, &client, args.json),
                KeysCommand::List => cli::run_keys_list(&config, args.json),
                KeysCommand::Revoke { client } => cli::run_keys_revoke(&config, &client, args.json),
            }
        }
    }
}

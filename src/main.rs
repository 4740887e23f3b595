use clap::{Parser, Subcommand};
use shardpipe::config::resolve_config_path;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "shardpipe")]
#[command(about = "Partitioned payload processing with multi-replica status tracking", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one JSON payload and print its aggregated status
    Run {
        #[arg(long)]
        payload: PathBuf,
        /// How long to wait for every replica to report, e.g. 30s or 2m
        #[arg(long, default_value = "30s", value_parser = parse_duration)]
        timeout: Duration,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shardpipe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Commands::Run { payload, timeout } => {
            shardpipe::cli::run::run(config_path, payload, timeout).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { stdout } => shardpipe::cli::config::init(stdout)?,
            ConfigAction::Validate => shardpipe::cli::config::validate(config_path)?,
        },
    }

    Ok(())
}

use applogs::cli::StreamArgs;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "applogs")]
#[command(about = "Stream function execution logs for an app", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream logs until interrupted
    Stream(StreamArgs),
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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout carries the stream itself
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "applogs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Stream(args) => {
            applogs::cli::run::run(cli.config, args).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { stdout } => applogs::cli::config::init(stdout)?,
            ConfigAction::Validate => {
                let path = applogs::config::resolve_config_path(cli.config.as_deref());
                applogs::cli::config::validate(path)?;
            }
        },
    }

    Ok(())
}

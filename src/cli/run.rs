use crate::auth::{AuthError, Credential, Identity, SubscribeClient};
use crate::config::{load_config, resolve_config_path, validate_config, Config, ConfigError, OutputFormat};
use crate::poller::{Filters, PollClient, PollError};
use crate::session::{LogSessionRequest, SchedulerConfig, Session, SessionSummary};
use crate::sink::{JsonLinesSink, LogFileWriter, PersistingSink, Sink, TextSink};
use clap::Args;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build subscribe client: {0}")]
    Auth(#[from] AuthError),

    #[error("failed to build poll client: {0}")]
    Poll(#[from] PollError),

    #[error("{0}")]
    Fatal(String),
}

#[derive(Debug, Clone, Args)]
pub struct StreamArgs {
    /// Store whose logs are streamed
    #[arg(long, env = "APPLOGS_STORE_ID")]
    pub store: String,

    /// API key of the app
    #[arg(long, env = "APPLOGS_API_KEY")]
    pub api_key: String,

    /// Only show records with this status
    #[arg(long, value_parser = ["success", "failure"])]
    pub status: Option<String>,

    /// Only show records from this source
    #[arg(long)]
    pub source: Option<String>,

    /// Resume from a cursor returned by an earlier session
    #[arg(long)]
    pub cursor: Option<String>,

    /// Streaming token from an earlier subscribe call
    #[arg(long, env = "APPLOGS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Print one JSON object per line instead of formatted text
    #[arg(long)]
    pub json: bool,

    /// Also write every record to a JSON file under this directory
    #[arg(long)]
    pub write_dir: Option<PathBuf>,

    /// Override backend.poll_url
    #[arg(long)]
    pub poll_url: Option<String>,

    /// Override backend.subscribe_url
    #[arg(long)]
    pub subscribe_url: Option<String>,
}

pub async fn run(config_path: Option<PathBuf>, args: StreamArgs) -> Result<SessionSummary, RunError> {
    let config = load_effective_config(config_path.as_deref(), &args)?;

    let subscriber = SubscribeClient::new(&config.backend)?;
    let poller = PollClient::new(&config.backend)?;
    let sink = build_sink(&config, &args.api_key);
    let request = build_request(&args);

    info!(
        poll_url = %poller.url(),
        subscribe_url = %subscriber.url(),
        store_id = %args.store,
        "Streaming app logs"
    );

    let session = Session::new(
        request,
        subscriber,
        poller,
        sink,
        SchedulerConfig::from(&config.polling),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let summary = session.run(shutdown_rx).await;
    if let Some(message) = &summary.fatal {
        error!(cursor = %summary.cursor, "Log streaming stopped");
        return Err(RunError::Fatal(message.clone()));
    }

    info!(cursor = %summary.cursor, "Resume later with --cursor");
    Ok(summary)
}

/// Config file (or defaults) with command line overrides applied and checked.
pub fn load_effective_config(config_path: Option<&Path>, args: &StreamArgs) -> Result<Config, RunError> {
    let mut config = match resolve_config_path(config_path) {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(&path)?
        }
        None => Config::default(),
    };

    if let Some(url) = &args.poll_url {
        config.backend.poll_url = url.clone();
    }
    if let Some(url) = &args.subscribe_url {
        config.backend.subscribe_url = url.clone();
    }
    if args.json {
        config.output.format = OutputFormat::Json;
    }
    if let Some(dir) = &args.write_dir {
        config.output.write_dir = Some(crate::config::expand_tilde(dir));
    }

    validate_config(&config)?;
    if config.backend.subscribe_url.is_empty() {
        return Err(ConfigError::Validation(
            "backend.subscribe_url is not set; add it to the config file or pass --subscribe-url"
                .to_string(),
        )
        .into());
    }

    Ok(config)
}

pub fn build_request(args: &StreamArgs) -> LogSessionRequest {
    let mut request = LogSessionRequest::new(Identity::new(args.store.clone(), args.api_key.clone()))
        .with_filters(Filters::new(args.status.clone(), args.source.clone()));
    if let Some(cursor) = &args.cursor {
        request = request.with_cursor(cursor.clone());
    }
    if let Some(token) = &args.token {
        request = request.with_credential(Credential::new(token.clone()));
    }
    request
}

fn build_sink(config: &Config, api_key: &str) -> Box<dyn Sink> {
    let sink: Box<dyn Sink> = match config.output.format {
        OutputFormat::Text => Box::new(TextSink::stdout()),
        OutputFormat::Json => Box::new(JsonLinesSink::stdout()),
    };

    match &config.output.write_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "Writing log records to disk");
            Box::new(PersistingSink::new(sink, LogFileWriter::new(dir, api_key)))
        }
        None => sink,
    }
}

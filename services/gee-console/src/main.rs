//! Interactive console for the GEE satellite analysis backend.
//!
//! Reads commands from stdin and drives the same orchestration the web
//! page uses:
//! - region selection from the backend's administrative boundaries
//! - hand-drawn areas from GeoJSON files
//! - vegetation and land cover analyses, time series and exports
//! - statistics downloads written to the output directory

mod commands;
mod terminal;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::{Command, HELP};
use gee_client::{App, ClientConfig, GeeClient, Orchestrator, UiEvent};
use terminal::{TerminalMap, TerminalUi};

#[derive(Parser, Debug)]
#[command(name = "gee-console")]
#[command(about = "Interactive console for the GEE satellite analysis backend")]
struct Args {
    /// YAML client configuration (base_url, timeout_secs, retry, headers)
    #[arg(short, long, env = "GEE_CONFIG")]
    config: Option<PathBuf>,

    /// Backend base URL, overrides the config file
    #[arg(long, env = "GEE_API_URL")]
    api_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "GEE_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Attempts per request, including the first
    #[arg(long, env = "GEE_MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    /// Directory for downloaded statistics
    #[arg(long, env = "GEE_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Run the commands in this file instead of reading stdin
    #[arg(long)]
    script: Option<PathBuf>,
}

fn init_tracing(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.to_lowercase()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if args.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::default(),
    };

    if let Some(url) = &args.api_url {
        config.base_url = url.clone();
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout_secs = secs;
    }
    if let Some(attempts) = args.max_attempts {
        config.retry.max_attempts = attempts;
    }

    config.validate()?;
    Ok(config)
}

struct Console {
    app: App,
    ui: Arc<TerminalUi>,
    map: Arc<TerminalMap>,
}

impl Console {
    /// Returns `false` when the session should end.
    async fn handle(&self, line: &str) -> bool {
        let command = match commands::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return true,
            Err(e) => {
                self.ui.print(&e.to_string());
                return true;
            }
        };

        match command {
            Command::Event(event) => {
                self.app.dispatch(event).await;
            }
            Command::Draw { path, name } => match read_geojson(&path).await {
                Ok(geojson) => {
                    self.app.dispatch(UiEvent::AreaDrawn { geojson, name }).await;
                }
                Err(e) => self.ui.print(&format!("{:#}", e)),
            },
            Command::Set(setting) => {
                self.app
                    .orchestrator()
                    .update_params(|params| setting.apply(params))
                    .await;
            }
            Command::Status => self.print_status().await,
            Command::Help => self.ui.print(HELP),
            Command::Quit => return false,
        }
        true
    }

    async fn print_status(&self) {
        let orchestrator = self.app.orchestrator();
        let aoi = orchestrator.aoi().await;
        let params = orchestrator.params().await;
        let results = orchestrator.results().await;
        let table = terminal::status_table(
            aoi.as_ref(),
            &params,
            &results,
            &self.map.state(),
            self.app.is_backend_ready(),
        );
        self.ui.print(&table.to_string());
    }
}

async fn read_geojson(path: &Path) -> Result<serde_json::Value> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn prompt() {
    print!("gee> ");
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    let config = load_config(&args)?;
    info!(
        base_url = %config.base_url,
        timeout_secs = config.timeout_secs,
        max_attempts = config.retry.max_attempts,
        "Starting GEE console"
    );

    let client = GeeClient::from_config(&config).context("building HTTP client")?;
    let ui = Arc::new(TerminalUi::new(args.output_dir.clone()));
    let map = Arc::new(TerminalMap::default());
    let orchestrator = Arc::new(Orchestrator::new(client, ui.clone(), map.clone()));

    let app = App::bootstrap(orchestrator).await;
    let console = Console { app, ui, map };

    if let Some(script) = &args.script {
        let text = tokio::fs::read_to_string(script)
            .await
            .with_context(|| format!("reading {}", script.display()))?;
        for line in text.lines() {
            console.ui.print(&format!("gee> {}", line));
            if !console.handle(line).await {
                break;
            }
        }
        return Ok(());
    }

    console.ui.print("Type `help` for a list of commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if !console.handle(&line).await {
            break;
        }
    }

    info!("Session ended");
    Ok(())
}

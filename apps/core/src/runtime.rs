use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::api_client::{ApiClient, ApiError};
use crate::config::{self, Config, ConfigError};
use crate::contract::{prompt_message, DisplayEvent, ResultSet, StatusKind};
use crate::core_service::{CoreService, ServiceError, ServiceHandle};
use crate::logging;
use crate::query_dsl::Query;
use crate::transport;

const BINARY_NAME: &str = "wikisearch-core";

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http client error: {0}")]
    Client(#[from] ApiError),
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// Wikipedia search provider. Without `--query` it serves the host bridge:
/// JSON requests on stdin, JSON responses and display events on stdout.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "wikisearch-core", version)]
pub struct CliOptions {
    /// Config file to use instead of the default location.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Run one search, print the results, and exit.
    #[arg(long, value_name = "TEXT")]
    pub query: Option<String>,
    /// Seconds to wait for `--query` results.
    #[arg(long, value_name = "SECS", default_value_t = 15)]
    pub wait_secs: u64,
    /// Print the resolved config as TOML and exit.
    #[arg(long)]
    pub print_config: bool,
    /// Write the default config file if none exists, then exit.
    #[arg(long)]
    pub write_default_config: bool,
}

pub fn parse_cli_args(args: &[String]) -> Result<CliOptions, clap::Error> {
    CliOptions::try_parse_from(std::iter::once(BINARY_NAME.to_string()).chain(args.iter().cloned()))
}

pub fn run_with_options(options: CliOptions) -> Result<(), RuntimeError> {
    let config = config::load(options.config.as_deref())?;

    if options.print_config {
        let encoded = toml::to_string_pretty(&config).map_err(ConfigError::from)?;
        print!("{encoded}");
        return Ok(());
    }

    if options.write_default_config {
        if config.config_path.exists() {
            println!(
                "[{BINARY_NAME}] config already exists at {}",
                config.config_path.display()
            );
        } else {
            config::save(&config)?;
            println!(
                "[{BINARY_NAME}] wrote default config to {}",
                config.config_path.display()
            );
        }
        return Ok(());
    }

    if let Err(error) = logging::init() {
        eprintln!("[{BINARY_NAME}] logging disabled: {error}");
    }
    info!(
        config_path = %config.config_path.display(),
        keyword = %config.keyword,
        language = %config.default_language,
        "startup"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match options.query {
        Some(text) => runtime.block_on(run_query(
            &config,
            &text,
            Duration::from_secs(options.wait_secs),
        )),
        None => runtime.block_on(run_bridge(&config)),
    }
}

fn start_service(
    config: &Config,
) -> Result<(ServiceHandle, mpsc::UnboundedReceiver<DisplayEvent>, ApiClient), RuntimeError> {
    let client = ApiClient::new(config.endpoint(), config.http_timeout(), &config.user_agent)?;
    let (display_tx, display_rx) = mpsc::unbounded_channel();
    let (service, handle) = CoreService::new(config.search_settings(), client.clone(), display_tx);
    tokio::spawn(service.run());
    Ok((handle, display_rx, client))
}

async fn run_bridge(config: &Config) -> Result<(), RuntimeError> {
    let (handle, mut display_rx, _) = start_service(config)?;
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(mut line) = out_rx.recv().await {
            line.push('\n');
            if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
                break;
            }
        }
    });

    let events_out = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = display_rx.recv().await {
            if events_out.send(transport::encode_event(event)).is_err() {
                break;
            }
        }
    });

    info!("host bridge ready");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = transport::handle_json(&handle, line).await;
        if out_tx.send(response).is_err() {
            break;
        }
    }

    info!("stdin closed; shutting down");
    drop(handle);
    let _ = forwarder.await;
    drop(out_tx);
    let _ = writer.await;
    Ok(())
}

async fn run_query(config: &Config, text: &str, wait: Duration) -> Result<(), RuntimeError> {
    let query = Query::parse(text, &config.keyword);
    let (term, language) = if query.trigger {
        (query.term.unwrap_or_default(), query.language)
    } else {
        (text.trim().to_string(), None)
    };
    if term.is_empty() {
        println!("{}", prompt_message());
        return Ok(());
    }

    let (handle, mut display_rx, client) = start_service(config)?;
    handle.search_text(term, language)?;

    let mut outcome = QueryOutcome::default();
    let finished = tokio::time::timeout(wait, outcome.collect(&mut display_rx))
        .await
        .is_ok();
    if !finished {
        warn!(wait_secs = wait.as_secs(), "query timed out before every page was ready");
    }

    match outcome {
        QueryOutcome {
            results: Some(set), ..
        } => print!("{}", render_result_set(&set, &client)),
        QueryOutcome {
            status: Some(message),
            ..
        } => println!("{message}"),
        _ => println!("[{BINARY_NAME}] no response within {}s", wait.as_secs()),
    }
    Ok(())
}

#[derive(Debug, Default)]
struct QueryOutcome {
    status: Option<String>,
    results: Option<ResultSet>,
}

impl QueryOutcome {
    async fn collect(&mut self, events: &mut mpsc::UnboundedReceiver<DisplayEvent>) {
        let mut pending = 0_usize;
        while let Some(event) = events.recv().await {
            match event {
                DisplayEvent::Status { kind, message, suggestion } => {
                    if kind == StatusKind::Searching {
                        continue;
                    }
                    self.status = Some(match suggestion {
                        Some(suggestion) => format!("{message}\nDid you mean: {suggestion}"),
                        None => message,
                    });
                    return;
                }
                DisplayEvent::Results(set) => {
                    pending = set.pages.len();
                    self.results = Some(set);
                }
                DisplayEvent::PageReady { page, .. } => {
                    if let Some(set) = self.results.as_mut() {
                        if let Some(slot) = set.pages.iter_mut().find(|p| p.id == page.id) {
                            *slot = page;
                        }
                    }
                    pending = pending.saturating_sub(1);
                    if pending == 0 {
                        return;
                    }
                }
                DisplayEvent::EntryText { .. } | DisplayEvent::Clear => {}
            }
        }
    }
}

fn render_result_set(set: &ResultSet, client: &ApiClient) -> String {
    let mut out = String::new();
    for page in &set.pages {
        let url = page
            .url
            .clone()
            .unwrap_or_else(|| client.url_for_page_id(&set.language, page.id));
        out.push_str(&format!("{}\n  {}\n  {url}\n", page.title, page.extract));
        if let Some(image) = page.page_image() {
            out.push_str(&format!("  image: {} {}\n", image.clean_title(), image.thumb_url));
        }
    }
    if let Some(suggestion) = &set.suggestion {
        out.push_str(&format!("Did you mean: {suggestion}\n"));
    }
    out
}

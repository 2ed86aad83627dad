//! HttpSink runner
//!
//! Reads sink records as newline-delimited JSON on stdin, performs the HTTP
//! call each one describes, and when the source side is enabled writes the
//! resulting acknowledgement records as newline-delimited JSON on stdout.
//! Logs go to stderr.
//!
//! Stops at end of input or on Ctrl+C / SIGTERM, after draining every
//! acknowledgement already queued.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hs_config::SinkConfig;
use hs_sink::{AckSourceTask, ExchangeBroker, HttpSinkTask, SinkRecord, SourceRecord};

/// HttpSink runner
#[derive(Parser, Debug)]
#[command(name = "hs-sink")]
#[command(about = "Execute HTTP calls described by JSON records, with retries")]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "HS_CONFIG")]
    config: Option<PathBuf>,

    /// Records handed to the sink per batch
    #[arg(long, env = "HS_BATCH_SIZE", default_value = "100")]
    batch_size: usize,

    /// How long the source waits for acknowledgements per poll
    #[arg(long, env = "HS_POLL_INTERVAL_MS", default_value = "500")]
    poll_interval_ms: u64,

    /// Emit logs as JSON
    #[arg(long, env = "HS_JSON_LOGS", default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    info!("Starting HttpSink");

    let config = SinkConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let broker = Arc::new(ExchangeBroker::new());
    let sink = HttpSinkTask::from_config(&config, broker.clone())?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let source_handle = if config.source.enabled {
        let mut source = AckSourceTask::new(broker.clone(), config.source.clone());
        source.start()?;
        let shutdown_rx = shutdown_tx.subscribe();
        let interval = Duration::from_millis(args.poll_interval_ms);
        Some(tokio::spawn(run_source(source, interval, shutdown_rx)))
    } else {
        info!("Source side disabled, acknowledgements are not emitted");
        None
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut batch = Vec::with_capacity(args.batch_size.max(1));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => {
                        if let Some(record) = parse_record(&line) {
                            batch.push(record);
                        }
                        if batch.len() >= args.batch_size.max(1) {
                            run_batch(&sink, std::mem::take(&mut batch)).await;
                        }
                    }
                    None => {
                        info!("End of input");
                        break;
                    }
                }
            }
        }
    }

    if !batch.is_empty() {
        run_batch(&sink, batch).await;
    }

    let _ = shutdown_tx.send(());
    if let Some(handle) = source_handle {
        if let Err(e) = handle.await {
            error!("Source task failed: {}", e);
        }
    }

    info!("HttpSink stopped");
    Ok(())
}

fn parse_record(line: &str) -> Option<SinkRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(error = %e, "Skipping malformed record");
            None
        }
    }
}

async fn run_batch(sink: &HttpSinkTask, records: Vec<SinkRecord>) {
    for result in sink.put(records).await {
        if let Err(e) = result {
            warn!(error = %e, "Record rejected");
        }
    }
}

async fn run_source(source: AckSourceTask, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            polled = source.poll_wait(interval) => emit(polled),
        }
    }

    // whatever the sink published before shutdown
    loop {
        let records = source.poll();
        if records.is_empty() {
            break;
        }
        emit(records);
    }
}

fn emit(records: Vec<SourceRecord>) {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for record in records {
        match serde_json::to_string(&record) {
            Ok(json) => {
                if let Err(e) = writeln!(out, "{}", json) {
                    error!(error = %e, "Failed to write acknowledgement");
                }
            }
            Err(e) => error!(error = %e, "Failed to serialize acknowledgement"),
        }
    }
    let _ = out.flush();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

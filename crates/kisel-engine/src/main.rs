//! Engine entry point.
//!
//! ```text
//! kisel-engine [journal.ndjson]
//! ```
//!
//! Reads the journal from the given file, or stdin when absent. Output
//! lines go to stdout and logs to stderr. Configuration comes from the file
//! named by `KISEL_CONFIG` (default `kisel-config.yaml`); a missing file
//! means all defaults.

use std::path::PathBuf;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kisel_core::{KiselConfig, LogFormat};
use kisel_engine::{Engine, InboundEvent, OutboundLine};

const DEFAULT_CONFIG_PATH: &str = "kisel-config.yaml";

/// Application entry point.
///
/// Loads configuration, initializes logging, opens the stores, and replays
/// the journal through the engine. On end of input every open voice session
/// is drained and its minutes reported as forfeited.
///
/// # Errors
///
/// Returns an error if configuration, storage, or stdout fails. Bad journal
/// lines and rejected commands are logged and skipped.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_logging(&config);

    info!(
        data_dir = %config.storage.data_dir.display(),
        credit_on_switch = config.rewards.credit_on_switch,
        max_concurrent_dispatch = config.notify.max_concurrent_dispatch,
        promotion = config.catalog.promotion.roles().is_some(),
        "kisel-engine starting"
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundLine>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            let mut encoded = serde_json::to_vec(&line)?;
            encoded.push(b'\n');
            stdout.write_all(&encoded).await?;
        }
        stdout.flush().await?;
        anyhow::Ok(())
    });

    let engine = Engine::open(&config, tx).await?;

    match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("opening journal {}", path.display()))?;
            replay(&engine, file).await?;
        }
        None => replay(&engine, tokio::io::stdin()).await?,
    }

    let forfeited: u64 = engine.shutdown().iter().map(|p| p.minutes).sum();
    info!(forfeited_minutes = forfeited, "journal finished, shutting down");

    drop(engine);
    writer.await??;
    Ok(())
}

async fn replay(engine: &Engine, input: impl AsyncRead + Unpin) -> anyhow::Result<()> {
    let mut lines = BufReader::new(input).lines();
    let mut line_no: usize = 0;
    while let Some(line) = lines.next_line().await? {
        line_no = line_no.saturating_add(1);
        if line.trim().is_empty() {
            continue;
        }
        match InboundEvent::parse(line_no, &line) {
            Ok(event) => engine.handle(event).await,
            Err(e) => tracing::warn!(error = %e, "skipping journal line"),
        }
    }
    info!(lines = line_no, "journal drained");
    Ok(())
}

fn load_config() -> anyhow::Result<KiselConfig> {
    let path = std::env::var("KISEL_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = if path.exists() {
        KiselConfig::from_file(&path)
            .with_context(|| format!("loading config {}", path.display()))?
    } else {
        KiselConfig::parse("")?
    };
    Ok(config)
}

fn init_logging(config: &KiselConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

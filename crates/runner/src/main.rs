use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use checkpoints::{CheckpointStoreExt, FileCheckpointStore};
use clap::Parser;
use sheetforge_core::TapState;
use sheets_client::{ClientOptions, SheetsClient};
use sinks::StdoutSink;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use sheetforge_source::SyncRunner;

#[derive(Parser, Debug)]
#[command(name = "sheetforge", about = "Spreadsheet extraction tap")]
struct Args {
    /// Tap configuration file (YAML).
    #[arg(short, long)]
    config: String,

    /// Sync state file; created on first run.
    #[arg(long, default_value = "./data/sheetforge_state.json")]
    state: String,

    /// Emit logs as JSON lines (always on stderr).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let cfg = o11y::O11yConfig {
        logging: o11y::logging::Config {
            level: None,
            json: args.log_json,
            with_targets: false,
        },
        install_panic_hook: true,
    };
    let _ = o11y::init_all(&cfg);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "sync failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = sheetforge_config::load_from_path(&args.config)
        .context("load tap config")?;

    let store = FileCheckpointStore::new(&args.state).context("open state file")?;
    let mut state: TapState = store
        .get(&config.spreadsheet_id)
        .await
        .context("read sync state")?
        .unwrap_or_default();

    let client = SheetsClient::new(ClientOptions {
        access_token: config.access_token.clone(),
        request_timeout: Duration::from_secs(config.request_timeout_secs),
        user_agent: config.user_agent.clone(),
    })?;
    let sink = StdoutSink::new();

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let runner = SyncRunner::new(&client, &sink, &store, &config);
    let summary = runner.run(&mut state, &cancel).await?;

    info!(
        spreadsheet = %config.spreadsheet_id,
        short_circuited = summary.short_circuited,
        worksheets_loaded = summary.worksheets_loaded,
        worksheets_skipped = summary.worksheets_skipped,
        records = summary.records_emitted,
        "run finished"
    );
    Ok(())
}

fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling sync");
            cancel.cancel();
        }
    });
}

mod commands;
mod config;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{Bridge, MessagingClient, RequestPolicy, SessionStore};
use shared::{
    error::{ErrorReport, SyncError},
    gateway::SyncGateway,
};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

use commands::{Command, Outcome};
use config::Settings;

#[derive(Parser, Debug)]
#[command(name = "messenger", about = "One-to-one messaging client")]
struct Args {
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[arg(long)]
    blob_base_url: Option<String>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(v) = &self.database_url {
            settings.database_url = config::normalize_database_url(v);
        }
        if let Some(v) = &self.data_dir {
            settings.data_dir = v.clone();
        }
        if let Some(v) = &self.blob_base_url {
            settings.blob_base_url = v.clone();
        }
        if let Some(v) = self.timeout_ms {
            settings.request_timeout_ms = v;
        }
        settings
    }
}

/// State owned by the main thread; request results land here.
#[derive(Default)]
struct Screen {
    result: Option<Result<Outcome, SyncError>>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = args.apply(config::load_settings());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let client = runtime.block_on(connect(&settings))?;

    let bridge: Bridge<Screen> = Bridge::new(
        runtime.handle().clone(),
        RequestPolicy {
            timeout: settings.request_timeout(),
        },
    );
    let command = args.command;
    let label = command.label();
    let handle = bridge.submit(
        label,
        commands::execute(client, command),
        |screen: &mut Screen, result| screen.result = Some(result),
    );

    let interrupt = handle.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let mut screen = Screen::default();
    while screen.result.is_none() {
        bridge.wait_one(&mut screen, Duration::from_millis(100));
    }

    match screen.result {
        Some(Ok(outcome)) => {
            print!("{}", commands::render(&outcome));
            Ok(())
        }
        Some(Err(err)) => {
            let report = ErrorReport::from(&err);
            bail!("{label} failed ({:?}): {}", report.code, report.message)
        }
        None => bail!("{label} produced no result"),
    }
}

async fn connect(settings: &Settings) -> Result<MessagingClient> {
    let storage = Storage::new(&settings.database_url)
        .await
        .with_context(|| format!("failed to open {}", settings.database_url))?
        .with_blob_base_url(settings.blob_base_url.clone());
    storage.health_check().await?;

    let session = SessionStore::open(&settings.data_dir)
        .await
        .with_context(|| format!("failed to open session in {}", settings.data_dir.display()))?;
    info!(database_url = %settings.database_url, data_dir = %settings.data_dir.display(), "client ready");

    let gateway: Arc<dyn SyncGateway> = Arc::new(storage);
    Ok(MessagingClient::new(gateway, session))
}

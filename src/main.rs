use anyhow::Result;
use clap::Parser;
use oralb_monitor::domain::settings::SettingsService;
use oralb_monitor::infrastructure::bluetooth::scanner::{self, BleScanner};
use oralb_monitor::infrastructure::logging;
use oralb_monitor::{BtleplugTransport, DeviceSession};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Poll an Oral-B toothbrush over Bluetooth and print its telemetry as JSON.
#[derive(Debug, Parser)]
#[command(name = "oralb-monitor", version)]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Advertised device name to look for
    #[arg(long)]
    name: Option<String>,

    /// Delay between refreshes in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Print one snapshot and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings_service = match &cli.config {
        Some(path) => SettingsService::load(path.clone()),
        None => SettingsService::new()?,
    };
    {
        let settings = settings_service.get_mut();
        if let Some(name) = &cli.name {
            settings.device_name = name.clone();
        }
        if let Some(interval) = cli.interval_ms {
            settings.poll_interval_ms = interval;
        }
    }
    let settings = settings_service.get().clone();

    let _log_guard = logging::init_logger(&settings.log_settings)?;
    info!("Starting Oral-B monitor");

    let adapter = scanner::default_adapter().await?;
    let scanner = BleScanner::new(adapter.clone());
    let transport = Arc::new(BtleplugTransport::new(
        adapter,
        settings.connection_config(),
    ));
    let session = DeviceSession::new(transport, settings.session_config());

    let poll = async {
        loop {
            if !session.is_bound() {
                match scanner
                    .discover(&settings.device_name, settings.scan_duration())
                    .await
                {
                    Ok(Some(device)) => session.bind(device),
                    Ok(None) => info!("No \"{}\" found, rescanning", settings.device_name),
                    Err(e) => warn!("Scan failed: {}", e),
                }
            }

            if session.is_bound() {
                let snapshot = session.refresh().await;
                println!("{}", serde_json::to_string(&*snapshot)?);
                if cli.once {
                    return Ok::<_, anyhow::Error>(());
                }
            }

            tokio::time::sleep(settings.poll_interval().max(Duration::from_millis(100))).await;
        }
    };

    tokio::select! {
        result = poll => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    session.release().await;
    info!("Oral-B monitor stopped");
    Ok(())
}

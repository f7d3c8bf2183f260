//! Tag Relay Daemon
//!
//! Finds an RFID interrogator among the serial ports, then forwards the
//! unique tags seen in each read window to a microcontroller on another
//! serial port.

mod settings;

use std::process::ExitCode;

use anyhow::{Context, Result};
use rfid_detect::{PortScanner, ScannerConfig};
use rfid_relay::{NativeSerial, Relay, RelayCommand, RelayError, RelayExit};
use rfid_sim::VirtualReaderFactory;
use settings::{ReaderBackend, Settings};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Include all our crates in the default filter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tagrelay=info,rfid_protocol=info,rfid_detect=info,rfid_relay=info,rfid_sim=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tagrelay {}", env!("CARGO_PKG_VERSION"));

    match run().await {
        Ok(RelayExit::Interrupted) => ExitCode::SUCCESS,
        Err(e) => {
            if matches!(e.downcast_ref::<RelayError>(), Some(RelayError::ConnectionLost)) {
                error!("Reader connection lost, exiting");
            } else {
                error!("{:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<RelayExit> {
    let settings = load_settings();
    let config = settings.to_relay_config();
    let scanner = PortScanner::with_config(ScannerConfig {
        skip_patterns: settings.skip_patterns.clone(),
    });

    let (cmd_tx, cmd_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                let _ = cmd_tx.send(RelayCommand::Shutdown).await;
            }
            Err(e) => {
                warn!("Failed to listen for interrupts: {}", e);
                // Dropping the sender would stop the relay
                std::future::pending::<()>().await;
            }
        }
    });

    let exit = match settings.backend {
        ReaderBackend::Simulated(reader) => {
            info!("Using simulated interrogator backend");
            let factory = VirtualReaderFactory::new(reader);
            Relay::new(config, factory, scanner, NativeSerial)
                .run(cmd_rx)
                .await
                .context("Relay failed")?
        }
    };
    Ok(exit)
}

/// Load settings, writing the defaults out on first run
fn load_settings() -> Settings {
    match Settings::settings_path() {
        Some(path) if !path.exists() => {
            let settings = Settings::default();
            match settings.save() {
                Ok(path) => info!("Wrote default settings to {}", path.display()),
                Err(e) => warn!("{:#}", e),
            }
            settings
        }
        _ => Settings::load(),
    }
}

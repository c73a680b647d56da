//! Zenoh bridge for Eastron energy meters.

use anyhow::{Context, Result};
use clap::Parser;
use meterlink_common::StateKeyBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use zenoh_bridge_eastron::catalog::ModelCatalog;
use zenoh_bridge_eastron::config::EastronBridgeConfig;
use zenoh_bridge_eastron::decoder::Decoder;
use zenoh_bridge_eastron::link::LinkHealthTracker;
use zenoh_bridge_eastron::poller::{MeterPoller, PollSettings};
use zenoh_bridge_eastron::publisher::ZenohStatePublisher;
use zenoh_bridge_eastron::status::{BridgeStatus, MeterInfo};
use zenoh_bridge_eastron::transport::RtuTransport;

/// How long the poller gets to report the link down and release the port.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Zenoh bridge for Eastron energy meters (Modbus RTU).
#[derive(Parser, Debug)]
#[command(name = "zenoh-bridge-eastron")]
#[command(about = "Polls an Eastron meter and publishes its readings to Zenoh")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "eastron.json5")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Print the available device models and exit.
    #[arg(long)]
    list_models: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = EastronBridgeConfig::load_from_file(&args.config);

    if args.list_models {
        let models_file = config
            .as_ref()
            .ok()
            .and_then(|c| c.eastron.models_file.clone());
        let catalog = ModelCatalog::with_overrides(models_file.as_deref())?;
        for name in catalog.list_models() {
            println!("{}", name);
        }
        return Ok(());
    }

    let config =
        config.with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let log_config = config
        .logging
        .with_level_override(args.log_level.as_deref());
    meterlink_common::init_tracing(&log_config)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting zenoh-bridge-eastron");
    info!("Loaded configuration from {:?}", args.config);

    let meter = &config.eastron;
    let catalog = ModelCatalog::with_overrides(meter.models_file.as_deref())?;
    let model = match catalog.select(meter.model.as_deref()) {
        Ok(model) => model.clone(),
        Err(e) => {
            error!(error = %e, "Select a device model");
            return Err(e.into());
        }
    };

    let session = Arc::new(
        meterlink_common::connect(&config.zenoh)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to Zenoh: {}", e))?,
    );

    let keys = StateKeyBuilder::new(&meter.key_prefix, &meter.device);
    let status_publisher =
        ZenohStatePublisher::new(session.clone(), keys.clone(), config.serialization);
    let version = env!("CARGO_PKG_VERSION");

    let transport = match RtuTransport::connect(&meter.serial, meter.unit_id) {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = %e, "Cannot open meter link, not polling");
            let failed = BridgeStatus::failed(version, &e);
            if let Err(e) = status_publisher.publish_status(&failed).await {
                warn!(error = %e, "Failed to publish bridge status");
            }
            if let Err(close) = session.close().await {
                warn!(error = %close, "Failed to close Zenoh session");
            }
            return Err(e.into());
        }
    };
    info!(port = %transport.port(), "Port opened, starting polling");

    let running = BridgeStatus::running(
        version,
        MeterInfo {
            device: meter.device.clone(),
            model: model.name.clone(),
            registers: model.len(),
            port: transport.port().to_string(),
            unit_id: meter.unit_id,
        },
    );
    if let Err(e) = status_publisher.publish_status(&running).await {
        warn!(error = %e, "Failed to publish bridge status");
    }

    let state_publisher = ZenohStatePublisher::new(session.clone(), keys, config.serialization);
    let poller = MeterPoller::new(
        model,
        transport,
        state_publisher,
        Decoder::new(meter.absolute_value),
        LinkHealthTracker::new(meter.failure_threshold),
        PollSettings::from(meter),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller_task = tokio::spawn(poller.run(shutdown_rx));

    wait_for_signal().await;

    // The poller reports the link down itself once it sees the signal.
    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(SHUTDOWN_GRACE, poller_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Poller task failed"),
        Err(_) => warn!("Poller did not stop in time"),
    }

    let offline = BridgeStatus::offline(version);
    if let Err(e) = status_publisher.publish_status(&offline).await {
        warn!(error = %e, "Failed to publish offline status");
    }

    session
        .close()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to close Zenoh session: {}", e))?;
    info!("Eastron bridge stopped");

    Ok(())
}

/// Wait for Ctrl+C or, on Unix, SIGTERM.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            error!(error = %e, "Failed to listen for Ctrl+C");
                        }
                        info!("Received Ctrl+C, shutting down");
                    }
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Cannot listen for SIGTERM"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
    }
    info!("Received Ctrl+C, shutting down");
}

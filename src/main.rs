// Liquidation Watch - binary entry point
// Refresh the symbol universe, then stream liquidations until shutdown

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use liquidation_watch::core::{setup_logging, AppConfig};
use liquidation_watch::layer1::{BinanceRestClient, BybitRestClient, LiquidationStream};
use liquidation_watch::layer2::{UniverseRefresher, UniverseStore};
use liquidation_watch::layer3::{AlertDispatcher, EventClassifier, TelegramNotifier};
use liquidation_watch::AlertPipeline;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1);
    let config = AppConfig::load(config_path.as_deref())?;

    setup_logging(&config.monitoring.log_level, config.monitoring.log_json);
    config.validate()?;

    let binance = Arc::new(BinanceRestClient::from_config(&config.binance)?);
    let bybit = Arc::new(BybitRestClient::from_config(&config.bybit)?);

    let store = Arc::new(UniverseStore::new());
    let refresher = Arc::new(UniverseRefresher::new(
        store.clone(),
        binance,
        bybit,
        config.universe.clone(),
    ));

    // Readiness barrier: nothing is classified against an empty universe.
    // A failed first fetch is fatal at boot; later failures only skip cycles.
    refresher.refresh_once().await?;
    info!(stats = %store.get_stats(), "Initial universe loaded");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(refresher.clone().run(shutdown_rx));

    let stream = Arc::new(LiquidationStream::from_config(&config.binance));
    stream.connect().await;

    let notifier = TelegramNotifier::from_config(&config.telegram)?;
    let pipeline = Arc::new(AlertPipeline::new(
        stream,
        EventClassifier::new(
            store,
            config.alert.min_notional_usd,
            config.telegram.channel_id,
        ),
        AlertDispatcher::new(Arc::new(notifier)),
    ));

    let pipeline_task = pipeline.clone();
    tokio::select! {
        _ = pipeline_task.run() => {
            error!("Pipeline exited on its own");
        }
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
        }
    }

    let _ = shutdown_tx.send(true);
    pipeline.stop();
    info!(stats = %pipeline.get_stats(), "Liquidation watch stopped");

    Ok(())
}

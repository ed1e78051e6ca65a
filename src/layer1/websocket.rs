// WebSocket Stream Connector for the Binance force-order feed
// Persistent connection with resubscribe-on-reconnect and capped backoff

use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock as AsyncRwLock};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};

use crate::core::ConnectionStatus;

/// All-market forced-liquidation stream name.
pub const FORCE_ORDER_STREAM: &str = "!forceOrder@arr";

/// How a single established session ended.
enum SessionEnd {
    /// Shutdown was requested; do not reconnect.
    Shutdown,
    /// Server closed or the read errored after a successful subscribe.
    Dropped,
}

/// Stream connector statistics
#[derive(Debug, Clone)]
pub struct StreamStats {
    pub state: ConnectionStatus,
    pub message_count: u64,
    pub error_count: u64,
    pub reconnect_count: u64,
}

impl std::fmt::Display for StreamStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "StreamStats(state={}, messages={}, errors={}, reconnects={})",
            self.state, self.message_count, self.error_count, self.reconnect_count
        )
    }
}

/// Persistent client for the Binance futures websocket feed.
///
/// `connect` spawns a background task that owns the socket for the process
/// lifetime: subscribe on open, forward text frames into an unbounded
/// channel, and loop back through connect-with-backoff on any failure.
pub struct LiquidationStream {
    url: String,
    streams: Vec<String>,

    state: Arc<RwLock<ConnectionStatus>>,
    message_count: Arc<RwLock<u64>>,
    error_count: Arc<RwLock<u64>>,
    reconnect_count: Arc<RwLock<u64>>,

    message_rx: AsyncRwLock<Option<mpsc::UnboundedReceiver<String>>>,

    next_request_id: Arc<AtomicU32>,

    ping_interval_secs: u64,
    max_backoff_secs: u64,
    jitter_cap_ms: u64,

    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl LiquidationStream {
    pub fn new(ws_base_url: &str, config: &crate::core::BinanceConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            url: format!("{}/ws", ws_base_url),
            streams: vec![FORCE_ORDER_STREAM.to_string()],
            state: Arc::new(RwLock::new(ConnectionStatus::Disconnected)),
            message_count: Arc::new(RwLock::new(0)),
            error_count: Arc::new(RwLock::new(0)),
            reconnect_count: Arc::new(RwLock::new(0)),
            message_rx: AsyncRwLock::new(None),
            next_request_id: Arc::new(AtomicU32::new(1)),
            ping_interval_secs: config.ws_ping_interval_secs,
            max_backoff_secs: config.reconnect_max_backoff_secs,
            jitter_cap_ms: config.reconnect_jitter_cap_ms,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn from_config(config: &crate::core::BinanceConfig) -> Self {
        Self::new(&config.ws_base_url, config)
    }

    /// Spawn the background receive loop.
    pub async fn connect(&self) {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel::<String>();
        *self.message_rx.write().await = Some(msg_rx);

        let url = self.url.clone();
        let streams = self.streams.clone();
        let state = self.state.clone();
        let message_count = self.message_count.clone();
        let error_count = self.error_count.clone();
        let reconnect_count = self.reconnect_count.clone();
        let next_request_id = self.next_request_id.clone();
        let ping_interval_secs = self.ping_interval_secs;
        let max_backoff_secs = self.max_backoff_secs;
        let jitter_cap_ms = self.jitter_cap_ms;
        let shutdown_rx = self.shutdown_rx.clone();

        info!(url = %url, streams = ?streams, "Starting liquidation stream");

        tokio::spawn(async move {
            run_stream(
                url,
                streams,
                state,
                message_count,
                error_count,
                reconnect_count,
                msg_tx,
                next_request_id,
                ping_interval_secs,
                max_backoff_secs,
                jitter_cap_ms,
                shutdown_rx,
            )
            .await;
        });
    }

    /// Receive the next raw text frame. `None` once the stream has shut down.
    pub async fn recv(&self) -> Option<String> {
        let mut rx_lock = self.message_rx.write().await;
        match rx_lock.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Request a clean shutdown of the receive loop.
    pub fn disconnect(&self) {
        info!("Disconnecting liquidation stream");
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_connected(&self) -> bool {
        *self.state.read() == ConnectionStatus::Connected
    }

    pub fn get_stats(&self) -> StreamStats {
        StreamStats {
            state: *self.state.read(),
            message_count: *self.message_count.read(),
            error_count: *self.error_count.read(),
            reconnect_count: *self.reconnect_count.read(),
        }
    }
}

impl Drop for LiquidationStream {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        debug!("Liquidation stream dropped, shutdown signalled");
    }
}

/// Outer reconnect loop. Never exits on its own; only shutdown ends it.
#[allow(clippy::too_many_arguments)]
async fn run_stream(
    url: String,
    streams: Vec<String>,
    state: Arc<RwLock<ConnectionStatus>>,
    message_count: Arc<RwLock<u64>>,
    error_count: Arc<RwLock<u64>>,
    reconnect_count: Arc<RwLock<u64>>,
    message_tx: mpsc::UnboundedSender<String>,
    next_request_id: Arc<AtomicU32>,
    ping_interval_secs: u64,
    max_backoff_secs: u64,
    jitter_cap_ms: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut attempt = 0u32;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        *state.write() = if attempt == 0 {
            ConnectionStatus::Connecting
        } else {
            ConnectionStatus::Reconnecting
        };

        let session = try_session(
            &url,
            &streams,
            &state,
            &message_count,
            &message_tx,
            &next_request_id,
            ping_interval_secs,
            &mut shutdown_rx,
        )
        .await;

        match session {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::Dropped) => {
                // The subscribe went through, so the endpoint is healthy:
                // restart the backoff schedule.
                attempt = 0;
                *reconnect_count.write() += 1;
                warn!("Feed connection dropped, reconnecting");
            }
            Err(e) => {
                attempt = attempt.saturating_add(1);
                *error_count.write() += 1;
                error!(error = %e, attempt = attempt, "Feed connection failed");
            }
        }

        *state.write() = ConnectionStatus::Disconnected;

        let delay = backoff_delay(attempt, max_backoff_secs, jitter_cap_ms);
        debug!(delay_ms = delay.as_millis() as u64, "Backing off before reconnect");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    *state.write() = ConnectionStatus::Disconnected;
    info!("Liquidation stream stopped");
}

/// One connect-subscribe-receive session.
///
/// Errors before the subscribe frame is accepted bubble up as `Err`; anything
/// after that point ends the session as `Dropped`.
#[allow(clippy::too_many_arguments)]
async fn try_session(
    url: &str,
    streams: &[String],
    state: &Arc<RwLock<ConnectionStatus>>,
    message_count: &Arc<RwLock<u64>>,
    message_tx: &mpsc::UnboundedSender<String>,
    next_request_id: &Arc<AtomicU32>,
    ping_interval_secs: u64,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<SessionEnd, tokio_tungstenite::tungstenite::Error> {
    debug!(url = url, "Connecting to feed");

    let (ws_stream, _) = connect_async(url).await?;
    let (mut write, mut read) = ws_stream.split();

    let request_id = next_request_id.fetch_add(1, Ordering::Relaxed);
    write
        .send(Message::Text(subscribe_frame(streams, request_id)))
        .await?;

    *state.write() = ConnectionStatus::Connected;
    info!(streams = ?streams, request_id = request_id, "Subscribed to feed");

    let mut ping_interval = tokio::time::interval(Duration::from_secs(ping_interval_secs));
    ping_interval.tick().await; // first tick fires immediately, skip it

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }
            }

            _ = ping_interval.tick() => {
                if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                    warn!(error = %e, "Ping failed");
                    return Ok(SessionEnd::Dropped);
                }
            }

            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        *message_count.write() += 1;
                        if message_tx.send(text).is_err() {
                            // Consumer went away; treat like shutdown.
                            return Ok(SessionEnd::Shutdown);
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = write.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Binary(data))) => {
                        warn!(bytes = data.len(), "Unexpected binary frame");
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Feed closed by server");
                        return Ok(SessionEnd::Dropped);
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Feed read error");
                        return Ok(SessionEnd::Dropped);
                    }
                    None => {
                        info!("Feed stream ended");
                        return Ok(SessionEnd::Dropped);
                    }
                }
            }
        }
    }
}

/// Exponential backoff capped at `max_backoff_secs`, plus uniform jitter up
/// to `jitter_cap_ms`.
pub fn backoff_delay(attempt: u32, max_backoff_secs: u64, jitter_cap_ms: u64) -> Duration {
    let exp = 2u64.saturating_pow(attempt.min(16));
    let base_secs = exp.min(max_backoff_secs).max(1);
    let jitter_ms = if jitter_cap_ms > 0 {
        rand::thread_rng().gen_range(0..=jitter_cap_ms)
    } else {
        0
    };
    Duration::from_millis(base_secs * 1000 + jitter_ms)
}

/// Build a Binance SUBSCRIBE frame for the given streams.
pub fn subscribe_frame(streams: &[String], id: u32) -> String {
    serde_json::json!({
        "method": "SUBSCRIBE",
        "params": streams,
        "id": id,
    })
    .to_string()
}

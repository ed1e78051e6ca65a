// Alert Pipeline - stream -> parse -> classify -> dispatch
// One message is fully processed before the next receive

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::layer1::websocket::{LiquidationStream, StreamStats};
use crate::layer2::parser::{MessageParser, ParserStats};
use crate::layer3::classifier::{ClassifierStats, EventClassifier};
use crate::layer3::notifier::{AlertDispatcher, DispatcherStats};

/// Pipeline statistics
#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub is_running: bool,
    pub stream: StreamStats,
    pub parser: ParserStats,
    pub classifier: ClassifierStats,
    pub dispatcher: DispatcherStats,
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pipeline(running={}, frames={}, liquidations={}, alerts={}, sent={})",
            self.is_running,
            self.parser.frames_seen,
            self.parser.liquidations_parsed,
            self.classifier.alerts_produced,
            self.dispatcher.alerts_sent
        )
    }
}

/// Wires the feed into the classifier and dispatcher.
///
/// The receive loop is the only feed consumer and runs sequentially; there
/// is no internal queueing. Per-message work is cheap compared to the
/// real-world liquidation rate.
pub struct AlertPipeline {
    stream: Arc<LiquidationStream>,
    parser: Mutex<MessageParser>,
    classifier: EventClassifier,
    dispatcher: AlertDispatcher,
    is_running: Arc<RwLock<bool>>,
}

impl AlertPipeline {
    pub fn new(
        stream: Arc<LiquidationStream>,
        classifier: EventClassifier,
        dispatcher: AlertDispatcher,
    ) -> Self {
        Self {
            stream,
            parser: Mutex::new(MessageParser::new()),
            classifier,
            dispatcher,
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    /// Run one raw frame through parse -> classify -> dispatch.
    /// A bad frame is dropped with a warning; the loop never dies for it.
    pub async fn process_message(&self, raw_message: &str) {
        let parsed = self.parser.lock().parse(raw_message);
        match parsed {
            Ok(Some(event)) => {
                if let Some(alert) = self.classifier.classify(&event) {
                    self.dispatcher.dispatch(&alert).await;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Dropped malformed feed message");
            }
        }
    }

    /// Consume the feed until `stop` is called or the stream shuts down.
    pub async fn run(&self) {
        *self.is_running.write() = true;
        info!("Alert pipeline running");

        while *self.is_running.read() {
            match self.stream.recv().await {
                Some(raw) => self.process_message(&raw).await,
                None => {
                    info!("Feed channel closed, pipeline exiting");
                    break;
                }
            }
        }

        *self.is_running.write() = false;
        info!("Alert pipeline stopped");
    }

    /// Stop the loop and close the feed connection.
    pub fn stop(&self) {
        *self.is_running.write() = false;
        self.stream.disconnect();
    }

    pub fn is_running(&self) -> bool {
        *self.is_running.read()
    }

    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            is_running: *self.is_running.read(),
            stream: self.stream.get_stats(),
            parser: self.parser.lock().stats.clone(),
            classifier: self.classifier.get_stats(),
            dispatcher: self.dispatcher.get_stats(),
        }
    }
}

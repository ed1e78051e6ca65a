// Liquidation Watch
// Streams Binance futures forced liquidations, filters them against a
// volume-ranked symbol universe, and pushes qualifying events to Telegram.

pub mod core;
pub mod layer1;
pub mod layer2;
pub mod layer3;
pub mod pipeline;

pub use crate::core::{setup_logging, AppConfig};
pub use crate::pipeline::{AlertPipeline, PipelineStats};

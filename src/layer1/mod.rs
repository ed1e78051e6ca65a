// Layer 1 - Exchange Connectivity
// WebSocket feed plus the two REST snapshot clients

pub mod bybit_client;
pub mod rest_client;
pub mod websocket;

pub use bybit_client::{BybitRestClient, BybitTicker};
pub use rest_client::{BinanceRestClient, RestClientError, Ticker24hr};
pub use websocket::{LiquidationStream, StreamStats, FORCE_ORDER_STREAM};

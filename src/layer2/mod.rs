// Layer 2 - Data Processing
// Frame parsing plus the shared symbol universe and its refresh loop

pub mod parser;
pub mod refresher;
pub mod universe_store;

pub use parser::{MessageParser, ParseError, ParserStats};
pub use refresher::{
    LinearTickerSource, SymbolVolume, UniverseRefresher, VolumeTickerSource,
};
pub use universe_store::{SymbolUniverse, UniverseStore, UniverseStoreStats};

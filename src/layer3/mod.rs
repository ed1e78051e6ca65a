// Layer 3 - Classification & Dispatch
// Decides which liquidations become alerts and sends them out

pub mod classifier;
pub mod notifier;

pub use classifier::{ClassifierStats, EventClassifier};
pub use notifier::{
    format_alert, AlertDispatcher, AlertSink, DispatcherStats, NotifyError, TelegramNotifier,
};

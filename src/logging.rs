//! Logging setup for the binary and an in-memory capture layer that lets
//! library callers (and tests) inspect what the tiling engine reported,
//! such as out-of-memory retry notices.
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{Event, Subscriber, field::Visit};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::{Context, Layer};

/// Entries kept before the oldest are dropped.
pub const CAPTURE_CAPACITY: usize = 1000;

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub level: tracing::Level,
    pub timestamp: String,
    pub message: String,
    pub target: String,
}

impl LogEntry {
    pub fn new(level: tracing::Level, message: String, target: String) -> Self {
        let timestamp = chrono::Utc::now().format("%H:%M:%S%.3f").to_string();
        Self {
            level,
            timestamp,
            message,
            target,
        }
    }
}

/// Buffers every event it sees. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct CaptureLayer {
    buffer: Arc<Mutex<Vec<LogEntry>>>,
}

impl CaptureLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> Arc<Mutex<Vec<LogEntry>>> {
        Arc::clone(&self.buffer)
    }

    /// Snapshot of the captured entries.
    pub fn entries(&self) -> Vec<LogEntry> {
        match self.buffer.lock() {
            Ok(buf) => buf.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Captured messages containing `needle`.
    pub fn messages_containing(&self, needle: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.message.contains(needle))
            .map(|e| e.message)
            .collect()
    }
}

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);

        let message = if visitor.message.is_empty() {
            metadata.target().to_string()
        } else {
            visitor.message
        };
        let entry = LogEntry::new(*metadata.level(), message, metadata.target().to_string());

        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(entry);
            if buf.len() > CAPTURE_CAPACITY {
                buf.remove(0);
            }
        }
    }
}

/// Install the global fmt subscriber. `RUST_LOG` wins when set; otherwise
/// `verbose` selects DEBUG and the default is INFO.
pub fn init_cli_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed (e.g. by an embedding application)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{info, warn};
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn captures_messages_and_levels() {
        let layer = CaptureLayer::new();
        let subscriber = tracing_subscriber::registry().with(layer.clone());
        tracing::subscriber::with_default(subscriber, || {
            info!("planning {} tiles", 4);
            warn!("Out of memory, retrying");
        });
        let entries = layer.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "planning 4 tiles");
        assert_eq!(entries[1].level, tracing::Level::WARN);
        assert_eq!(layer.messages_containing("Out of memory").len(), 1);
    }
}

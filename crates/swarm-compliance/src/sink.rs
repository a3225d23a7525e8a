use crate::events::SwarmEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Receives every event the coordinator emits.
///
/// Calls happen inline on the coordinator's thread, so implementations must
/// return quickly and must not block.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &SwarmEvent);
}

/// Composite sink that dispatches events to multiple sinks, in insertion order.
#[derive(Clone, Default)]
pub struct EventSinkChain {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventSinkChain {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a sink to the chain.
    pub fn add(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Emit an event to all sinks in the chain.
    pub fn emit(&self, event: SwarmEvent) {
        for sink in &self.sinks {
            sink.record(&event);
        }
    }

    /// Number of sinks in the chain.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

impl std::fmt::Debug for EventSinkChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSinkChain")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Writes each event as a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &SwarmEvent) {
        let payload = serde_json::to_string(&event.kind).unwrap_or_default();
        info!(event = event.name(), timestamp = %event.timestamp, %payload, "swarm event");
    }
}

/// Hands events off to an async consumer (e.g. a persistence task) without blocking.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SwarmEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver the consumer should drain.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SwarmEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn record(&self, event: &SwarmEvent) {
        // A dropped receiver means nobody is persisting; the engine carries on.
        let _ = self.tx.send(event.clone());
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SwarmEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<SwarmEvent> {
        self.events.lock().clone()
    }

    /// Names of recorded events, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(SwarmEvent::name).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<SwarmEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &SwarmEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::events::SwarmEventKind;

    fn cancelled(id: &str) -> SwarmEvent {
        SwarmEvent::now(SwarmEventKind::TaskCancelled { task_id: id.into() })
    }

    #[test]
    fn test_chain_dispatches_to_all_sinks() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(MemorySink::new());
        let mut chain = EventSinkChain::new();
        chain.add(a.clone());
        chain.add(b.clone());
        chain.add(Arc::new(TracingSink));
        assert_eq!(chain.sink_count(), 3);

        chain.emit(cancelled("T1"));
        assert_eq!(a.len(), 1);
        assert_eq!(b.names(), vec!["task_cancelled"]);
    }

    #[test]
    fn test_memory_sink_drain() {
        let sink = MemorySink::new();
        sink.record(&cancelled("T1"));
        sink.record(&cancelled("T2"));
        assert_eq!(sink.drain().len(), 2);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new();
        sink.record(&cancelled("T3"));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.name(), "task_cancelled");
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.record(&cancelled("T4"));
    }
}

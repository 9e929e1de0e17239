//! # Stream Sink
//!
//! Broadcasts samples to all live subscribers as named events.
//!
//! Delivery is fire-and-forget: there is no guarantee to slow or
//! disconnected subscribers, and a subscriber that falls more than the
//! channel capacity behind loses the oldest events.

use tokio::sync::broadcast;
use tracing::warn;

use crate::sample::Sample;

/// Event name used for sample broadcasts
pub const SAMPLE_EVENT: &str = "imuData";

/// Live stream sink backed by a broadcast channel.
///
/// Cloning is cheap; all clones publish into the same channel. Payloads are
/// serialized once per published sample, not per subscriber.
#[derive(Debug, Clone)]
pub struct StreamSink {
    tx: broadcast::Sender<String>,
}

impl StreamSink {
    /// Create a stream sink
    ///
    /// # Arguments
    ///
    /// * `capacity` - Per-subscriber event backlog before lagging subscribers drop events
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Serialize a sample and broadcast it to all current subscribers.
    ///
    /// Having no subscribers is not an error; the event is simply dropped.
    pub fn publish(&self, sample: &Sample) {
        let payload = match serde_json::to_string(&sample.to_json()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Dropping unserializable sample: {}", e);
                return;
            }
        };

        // send only fails when there are no receivers
        let _ = self.tx.send(payload);
    }

    /// Subscribe to the live stream
    ///
    /// # Returns
    ///
    /// * `broadcast::Receiver<String>` - Serialized sample JSON, one message per sample
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Number of currently connected subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

//! In-process message bus.
//!
//! Named channels carrying opaque payloads. Two kinds of consumers:
//! - listeners registered with [`Bus::listen`], called synchronously on publish
//! - async subscribers from [`Bus::subscribe`], fed through a broadcast channel
//!
//! ```text
//! publish(channel, payload)
//!     ├─► listener 1 .. N      (inline, publisher's task)
//!     └─► broadcast::Sender ─► subscriber receivers (WebSocket streams, tests)
//! ```
//!
//! Publishing never blocks. Subscribers that fall behind observe `Lagged`.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Payload shared between all consumers of one message.
pub type Payload = Arc<[u8]>;

/// Synchronous channel listener.
pub type MessageHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

struct BusInner {
    listeners: DashMap<String, Vec<MessageHandler>>,
    subscribers: DashMap<String, broadcast::Sender<Payload>>,
    capacity: usize,
}

/// Cloneable handle to a message bus.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

impl Bus {
    /// Create a bus whose per-channel broadcast buffers hold `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: DashMap::new(),
                subscribers: DashMap::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Register a listener for `channel`.
    pub fn listen<F>(&self, channel: &str, handler: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .entry(channel.to_string())
            .or_default()
            .push(Arc::new(handler));
        tracing::debug!(channel = %channel, "Bus listener registered");
    }

    /// Receive every message published on `channel` from now on.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<Payload> {
        self.inner
            .subscribers
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.inner.capacity).0)
            .subscribe()
    }

    /// Publish a payload on `channel`.
    ///
    /// Returns the number of consumers reached.
    pub fn publish(&self, channel: &str, payload: impl Into<Payload>) -> usize {
        let payload: Payload = payload.into();

        // Clone out so no shard lock is held while listeners run.
        let listeners: Vec<MessageHandler> = self
            .inner
            .listeners
            .get(channel)
            .map(|l| l.value().clone())
            .unwrap_or_default();

        for listener in &listeners {
            listener(&payload);
        }

        let subscribers = self
            .inner
            .subscribers
            .get(channel)
            .and_then(|tx| tx.send(payload).ok())
            .unwrap_or(0);

        tracing::trace!(channel = %channel, listeners = listeners.len(), subscribers, "Published");
        listeners.len() + subscribers
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        self.inner.listeners.get(channel).map_or(0, |l| l.len())
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_listeners_called_inline() {
        let bus = Bus::new(8);
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        bus.listen("status", move |data| {
            s.fetch_add(data.len(), Ordering::SeqCst);
        });

        assert_eq!(bus.publish("status", b"abc".to_vec()), 1);
        assert_eq!(bus.publish("other", b"zz".to_vec()), 0);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert_eq!(bus.listener_count("status"), 1);
    }

    #[tokio::test]
    async fn test_subscribers_receive_payloads() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe("notice");
        bus.publish("notice", b"hello".to_vec());

        let payload = rx.recv().await.unwrap();
        assert_eq!(&payload[..], b"hello");
    }

    #[test]
    fn test_listener_may_publish() {
        let bus = Bus::new(8);
        let echo = bus.clone();
        bus.listen("in", move |data| {
            echo.publish("out", data.to_vec());
        });
        let mut rx = bus.subscribe("out");
        bus.publish("in", b"x".to_vec());
        assert_eq!(&rx.try_recv().unwrap()[..], b"x");
    }
}

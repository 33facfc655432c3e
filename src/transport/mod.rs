//! Channel transport boundary.
//!
//! A channel is a named topic carrying one message type as text payloads.
//! [`MessageBus`] is the subscribe/unsubscribe seam the router depends on;
//! [`ChannelHub`] is the in-process implementation that also backs the
//! WebSocket bridge in [`ws`].

pub mod ws;

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::TransportError;

/// Opaque reference to one active channel subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Mint an id. Intended for [`MessageBus`] implementations.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Subscribe/unsubscribe boundary for named channels.
///
/// Implementations deliver messages on their own schedule. Delivery is FIFO
/// within one channel; no ordering holds across channels. Both operations
/// fail with a [`TransportError`] if the channel handshake fails.
pub trait MessageBus: Send + Sync {
    fn subscribe(&self, channel: &str, subscriber: Subscriber)
    -> Result<SubscriptionId, TransportError>;

    fn unsubscribe(&self, channel: &str, id: SubscriptionId) -> Result<(), TransportError>;
}

type MessageFn = Box<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;
type ErrorFn = Box<dyn Fn(TransportError) + Send + Sync>;

/// A channel subscription handler: an unmarshalling on-message callback plus
/// an on-error callback.
///
/// The on-message future is awaited before the next message of the same
/// channel is delivered, preserving per-channel FIFO order.
pub struct Subscriber {
    on_message: MessageFn,
    on_error: ErrorFn,
}

impl Subscriber {
    /// Handler for channels carrying JSON payloads of type `T`.
    ///
    /// Payloads that fail to decode are logged and dropped; the subscription
    /// stays alive.
    pub fn json<T, F>(channel: &str, on_event: F) -> Self
    where
        T: DeserializeOwned,
        F: Fn(T) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let channel = channel.to_string();
        Self {
            on_message: Box::new(move |raw| match serde_json::from_str::<T>(&raw) {
                Ok(event) => on_event(event),
                Err(err) => {
                    warn!(channel = %channel, error = %err, "dropping undecodable channel message");
                    futures_util::future::ready(()).boxed()
                }
            }),
            on_error: Box::new(default_on_error),
        }
    }

    /// Handler for channels carrying raw text lines.
    pub fn text<F>(on_line: F) -> Self
    where
        F: Fn(String) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        Self {
            on_message: Box::new(on_line),
            on_error: Box::new(default_on_error),
        }
    }

    /// Replace the default (log-only) error callback.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(TransportError) + Send + Sync + 'static,
    {
        self.on_error = Box::new(f);
        self
    }

    /// Deliver one raw payload to this handler.
    pub async fn deliver(&self, payload: String) {
        (self.on_message)(payload).await;
    }

    /// Report a transport-level failure to this handler.
    pub fn error(&self, err: TransportError) {
        (self.on_error)(err);
    }
}

fn default_on_error(err: TransportError) {
    tracing::error!(error = %err, "channel delivery error");
}

struct SubscriptionEntry {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// In-process channel fan-out.
///
/// One broadcast sender per channel, created on demand. Each subscription
/// runs a forwarding task that awaits the subscriber's on-message future,
/// so delivery within a channel is FIFO per subscriber. Lagged receivers
/// are reported through the subscriber's error callback and keep receiving.
///
/// Unsubscription is cooperative: an in-flight on-message future runs to
/// completion, so a handler may unsubscribe its own channel and still
/// finish its work. No further messages are delivered afterwards.
///
/// `subscribe` must be called from within a tokio runtime.
pub struct ChannelHub {
    capacity: usize,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
    tasks: Mutex<HashMap<SubscriptionId, SubscriptionEntry>>,
    next_id: AtomicU64,
}

impl ChannelHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: Mutex::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<String> {
        let mut channels = self.channels.lock().expect("channel map poisoned");
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish a payload on a channel. Returns the number of subscribers
    /// that will receive it; zero subscribers is not an error.
    pub fn publish(&self, channel: &str, payload: impl Into<String>) -> usize {
        self.sender_for(channel).send(payload.into()).unwrap_or(0)
    }

    /// A raw receiver on a channel, used by the WebSocket bridge.
    pub fn watch(&self, channel: &str) -> broadcast::Receiver<String> {
        self.sender_for(channel).subscribe()
    }
}

impl MessageBus for ChannelHub {
    fn subscribe(
        &self,
        channel: &str,
        subscriber: Subscriber,
    ) -> Result<SubscriptionId, TransportError> {
        let mut rx = self.sender_for(channel).subscribe();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let channel_name = channel.to_string();
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    result = rx.recv() => match result {
                        Ok(payload) => subscriber.deliver(payload).await,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(channel = %channel_name, missed, "subscriber lagged behind channel");
                            subscriber.error(TransportError::Lagged {
                                channel: channel_name.clone(),
                                missed,
                            });
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!(channel = %channel_name, "channel closed, ending subscription");
                            break;
                        }
                    }
                }
            }
        });

        self.tasks
            .lock()
            .expect("subscription map poisoned")
            .insert(id, SubscriptionEntry { token, handle });
        Ok(id)
    }

    fn unsubscribe(&self, channel: &str, id: SubscriptionId) -> Result<(), TransportError> {
        match self
            .tasks
            .lock()
            .expect("subscription map poisoned")
            .remove(&id)
        {
            Some(entry) => {
                entry.token.cancel();
                Ok(())
            }
            None => Err(TransportError::UnknownSubscription {
                channel: channel.to_string(),
                id,
            }),
        }
    }
}

impl Drop for ChannelHub {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.lock() {
            for entry in tasks.values() {
                entry.token.cancel();
                entry.handle.abort();
            }
        }
    }
}

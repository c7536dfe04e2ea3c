//! In-process event bus.
//!
//! Producers publish without ever blocking: events go into a bounded
//! channel and are dropped when it is full. One dispatch loop drains the
//! channel in publish order and fans each event out to that type's
//! handlers, each on its own blocking task.
//!
//! ```text
//! publish ──try_send──► [bounded channel] ──► dispatch loop ──┬─► handler A
//!                                                            └─► handler B
//! ```
//!
//! A panicking handler is logged and does not affect its siblings or the
//! loop.

mod event;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

pub use event::{Event, EventType};

/// Subscriber callback. Runs on a blocking thread.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscribers = FxHashMap<EventType, Vec<(SubscriptionId, Handler)>>;

pub struct EventBus {
    sender: mpsc::Sender<Event>,
    receiver: Mutex<Option<mpsc::Receiver<Event>>>,
    /// Separate from the dispatch path; only held to copy handler lists
    subscribers: Arc<RwLock<Subscribers>>,
    next_subscription: AtomicU64,
    dropped: AtomicU64,
    cancel: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    /// Create a bus buffering at most `capacity` undelivered events.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            subscribers: Arc::new(RwLock::new(FxHashMap::default())),
            next_subscription: AtomicU64::new(1),
            dropped: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            dispatcher: Mutex::new(None),
        }
    }

    /// Spawn the dispatch loop on the current runtime.
    ///
    /// Returns `false` if the loop was already started.
    pub fn start(&self) -> bool {
        let Some(receiver) = self.receiver.lock().take() else {
            return false;
        };
        let subscribers = Arc::clone(&self.subscribers);
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(dispatch_loop(receiver, subscribers, cancel));
        *self.dispatcher.lock() = Some(handle);
        true
    }

    /// Enqueue an event without blocking.
    ///
    /// Returns `false` when the event was dropped (buffer full or bus stopped).
    pub fn publish(&self, event: Event) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(err) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if let mpsc::error::TrySendError::Full(event) = err {
                    crate::debug!("bus"; "buffer full, dropped {} ({} total)", event.kind, total);
                }
                false
            }
        }
    }

    pub fn subscribe<F>(&self, kind: EventType, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Returns `false` if `id` was not subscribed to `kind`.
    pub fn unsubscribe(&self, kind: EventType, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let Some(handlers) = subscribers.get_mut(&kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(sub, _)| *sub != id);
        let removed = handlers.len() < before;
        if handlers.is_empty() {
            subscribers.remove(&kind);
        }
        removed
    }

    pub fn subscriber_count(&self, kind: EventType) -> usize {
        self.subscribers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Events dropped since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop the dispatch loop after its current round; buffered events are
    /// discarded. Idempotent.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.dispatcher.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            crate::log!("bus"; "dispatch loop ended abnormally: {}", e);
        }
    }
}

async fn dispatch_loop(
    mut receiver: mpsc::Receiver<Event>,
    subscribers: Arc<RwLock<Subscribers>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = receiver.recv() => match event {
                Some(event) => dispatch(event, &subscribers).await,
                None => break,
            },
        }
    }
    receiver.close();
}

/// Deliver one event to every current handler and wait for all of them.
async fn dispatch(event: Event, subscribers: &RwLock<Subscribers>) {
    let handlers: Vec<Handler> = match subscribers.read().get(&event.kind) {
        Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
        None => return,
    };

    let kind = event.kind;
    let event = Arc::new(event);
    let mut tasks = JoinSet::new();
    for handler in handlers {
        let event = Arc::clone(&event);
        tasks.spawn_blocking(move || handler(&event));
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result
            && e.is_panic()
        {
            crate::log!("bus"; "handler for {} panicked", kind);
        }
    }
}

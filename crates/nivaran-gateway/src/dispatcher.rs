use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use nivaran_types::events::{InsertFilter, RowInsert};

use crate::backend::{FeedEvent, InsertCallback};
use crate::subscription::Subscription;

/// Change feed: fans committed inserts out to filtered subscribers.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every subscriber receives every insert and filters locally
    broadcast_tx: broadcast::Sender<RowInsert>,

    /// Number of subscription handles not yet cancelled
    live: Arc<AtomicUsize>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                live: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Publish a committed insert. Callers publish in commit order.
    pub fn publish(&self, row: RowInsert) {
        let _ = self.inner.broadcast_tx.send(row);
    }

    /// Register `on_insert` for rows matching `filter`.
    ///
    /// The receiver is attached before this returns, so every insert
    /// published afterwards is seen. Must be called inside a tokio runtime.
    pub fn subscribe_inserts(&self, filter: InsertFilter, on_insert: InsertCallback) -> Subscription {
        let mut rx = self.inner.broadcast_tx.subscribe();
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let task_filter = filter.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    result = rx.recv() => {
                        let row = match result {
                            Ok(row) => row,
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!(
                                    table = task_filter.table.as_str(),
                                    "Change feed subscriber lagged by {} inserts", n
                                );
                                if !cancelled.is_cancelled() {
                                    on_insert(FeedEvent::Lagged { missed: n });
                                }
                                continue;
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        };

                        if !task_filter.matches(&row) || cancelled.is_cancelled() {
                            continue;
                        }
                        on_insert(FeedEvent::Insert(row));
                    }
                }
            }
            debug!(table = task_filter.table.as_str(), "Change feed forwarder stopped");
        });

        Subscription::new(filter, token, self.inner.live.clone())
    }

    /// Subscriptions that have not been cancelled or dropped.
    pub fn live_subscriptions(&self) -> usize {
        self.inner.live.load(Ordering::Acquire)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

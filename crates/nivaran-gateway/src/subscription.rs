use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use nivaran_types::events::InsertFilter;

/// Handle to one live change-feed subscription.
///
/// `cancel` is idempotent and stops delivery; a callback already running on
/// the forwarding task may still finish. Dropping the handle cancels it.
pub struct Subscription {
    id: Uuid,
    filter: InsertFilter,
    token: CancellationToken,
    released: AtomicBool,
    live: Arc<AtomicUsize>,
}

impl Subscription {
    pub(crate) fn new(filter: InsertFilter, token: CancellationToken, live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::AcqRel);
        Self {
            id: Uuid::new_v4(),
            filter,
            token,
            released: AtomicBool::new(false),
            live,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn filter(&self) -> &InsertFilter {
        &self.filter
    }

    pub fn is_active(&self) -> bool {
        !self.released.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.token.cancel();
        self.live.fetch_sub(1, Ordering::AcqRel);
        debug!(
            subscription = %self.id,
            table = self.filter.table.as_str(),
            "Subscription cancelled"
        );
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .field("active", &self.is_active())
            .finish()
    }
}

//! Single-slot overwrite mailbox
//!
//! Hands the newest decoded command from the USB receive callback
//! (interrupt context) to the main loop. Holds at most one item; posting
//! while an item is pending replaces it. Taking never blocks.
//!
//! Built on [`embassy_sync::signal::Signal`], whose slot is guarded by the
//! raw mutex `M`, so a take can never observe a half-written item.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;

/// Capacity-one mailbox where the newest item wins
pub struct Mailbox<M: RawMutex, T> {
    slot: Signal<M, T>,
}

impl<M: RawMutex, T> Mailbox<M, T> {
    /// Create an empty mailbox
    pub const fn new() -> Self {
        Self {
            slot: Signal::new(),
        }
    }
}

impl<M: RawMutex, T: Send> Default for Mailbox<M, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, T: Send> Mailbox<M, T> {
    /// Store `item`, replacing any unread one
    ///
    /// Returns true if an unread item was replaced. The check is advisory:
    /// a concurrent take may land between the check and the store.
    pub fn post(&self, item: T) -> bool {
        let replaced = self.slot.signaled();
        self.slot.signal(item);
        replaced
    }

    /// Take the pending item, if any
    pub fn try_take(&self) -> Option<T> {
        self.slot.try_take()
    }

    /// Wait for an item
    pub async fn take(&self) -> T {
        self.slot.wait().await
    }

    /// True while an item is waiting to be taken
    pub fn is_full(&self) -> bool {
        self.slot.signaled()
    }

    /// Drop any pending item
    pub fn clear(&self) {
        self.slot.reset();
    }
}

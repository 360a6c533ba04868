use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

/// Set of event bits; bit `n` belongs to the `n`-th registered input.
pub type EventMask = u32;

/// Returned by a registration that did not get an event bit.
pub const INVALID_EVENT: EventMask = 0;

/// Number of distinct events an [`EventMask`] can address.
pub const MAX_EVENTS: usize = EventMask::BITS as usize;

/// Blocking side of an event group, as used by the assertion engine.
pub trait EventWait {
    /// Forget any pending occurrence of the bits in `mask`.
    fn clear_events(&self, mask: EventMask);

    /// Block until any (or, with `wait_for_all`, every) bit in `mask` is set,
    /// or until `timeout` elapses. Returns the requested bits that were set.
    ///
    /// When the wait is satisfied the returned bits are consumed.
    fn wait_events(&self, mask: EventMask, timeout: Duration, wait_for_all: bool) -> EventMask;
}

#[derive(Debug, Default)]
struct Shared {
    bits: Mutex<EventMask>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, EventMask> {
        self.bits.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A clearable bit set with one waiting side and any number of signallers.
///
/// Bits set while nobody waits stay set until a wait consumes them or they
/// are cleared.
#[derive(Debug, Clone, Default)]
pub struct EventGroup {
    shared: Arc<Shared>,
}

impl EventGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that can set bits from any thread.
    pub fn signal(&self) -> EventSignal {
        EventSignal {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Bits currently set.
    pub fn bits(&self) -> EventMask {
        *self.shared.lock()
    }
}

impl EventWait for EventGroup {
    fn clear_events(&self, mask: EventMask) {
        *self.shared.lock() &= !mask;
    }

    fn wait_events(&self, mask: EventMask, timeout: Duration, wait_for_all: bool) -> EventMask {
        let deadline = Instant::now() + timeout;
        let mut bits = self.shared.lock();

        loop {
            let seen = *bits & mask;
            let satisfied = if wait_for_all {
                seen == mask
            } else {
                seen != 0
            };
            if satisfied {
                *bits &= !seen;
                trace!(mask, seen, wait_for_all, "event wait satisfied");
                return seen;
            }

            let now = Instant::now();
            if now >= deadline {
                trace!(mask, seen, wait_for_all, "event wait timed out");
                return seen;
            }
            bits = self
                .shared
                .changed
                .wait_timeout(bits, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// Signalling side of an [`EventGroup`]. Never blocks for longer than the
/// internal lock is held.
#[derive(Debug, Clone)]
pub struct EventSignal {
    shared: Arc<Shared>,
}

impl EventSignal {
    pub fn set(&self, mask: EventMask) {
        *self.shared.lock() |= mask;
        self.shared.changed.notify_all();
    }
}

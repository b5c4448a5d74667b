//! Callback registries for the three observable event classes.
//!
//! Each event class (message, status, error) has its own independent
//! registry. Callbacks are invoked in registration order; a panicking
//! callback is logged and skipped so it cannot block delivery to the rest.
//!
//! Dispatch runs behind a reentrant gate tagged with a connection epoch:
//! `disconnect()` bumps the epoch and then takes the gate once, which both
//! stops any not-yet-started dispatch and waits out a batch already in
//! flight. The gate is reentrant so a subscriber may call `disconnect()`
//! from inside its own callback without deadlocking.

use parking_lot::ReentrantMutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::models::{ConnectionState, PushMessage, StreamError};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type Slots<T> = Mutex<Vec<(u64, Callback<T>)>>;

/// Handle for one registered callback.
///
/// Returned by every `subscribe_*` call. Invoking [`unsubscribe`] removes
/// exactly that registration; repeated invocations are no-ops. Dropping the
/// handle does NOT unregister the callback.
///
/// [`unsubscribe`]: Subscription::unsubscribe
pub struct Subscription {
    cancel: Box<dyn Fn() + Send + Sync>,
    cancelled: AtomicBool,
}

impl Subscription {
    /// Remove the registration this handle was created for. Idempotent.
    pub fn unsubscribe(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            (self.cancel)();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.cancelled.load(Ordering::SeqCst))
            .finish()
    }
}

/// One ordered list of callbacks for a single event class.
pub(crate) struct CallbackRegistry<T: 'static> {
    slots: Arc<Slots<T>>,
    next_id: AtomicU64,
}

impl<T: 'static> CallbackRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.slots
            .lock()
            .expect("subscriber registry poisoned")
            .push((id, Arc::new(callback)));

        let weak: Weak<Slots<T>> = Arc::downgrade(&self.slots);
        Subscription {
            cancel: Box::new(move || {
                if let Some(slots) = weak.upgrade() {
                    slots
                        .lock()
                        .expect("subscriber registry poisoned")
                        .retain(|(slot_id, _)| *slot_id != id);
                }
            }),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Invoke every callback in registration order, isolating panics.
    ///
    /// The slot list is snapshotted first so callbacks may freely
    /// subscribe/unsubscribe from inside the dispatch.
    fn emit(&self, value: &T, label: &str) {
        let snapshot: Vec<Callback<T>> = self
            .slots
            .lock()
            .expect("subscriber registry poisoned")
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
                log::error!("[DISPATCH] A {} subscriber panicked; skipping it", label);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

/// The three registries plus the epoch-tagged dispatch gate.
pub(crate) struct EventRegistries {
    messages: CallbackRegistry<PushMessage>,
    statuses: CallbackRegistry<ConnectionState>,
    errors: CallbackRegistry<StreamError>,
    gate: ReentrantMutex<()>,
    active_epoch: AtomicU64,
}

impl EventRegistries {
    pub(crate) fn new() -> Self {
        Self {
            messages: CallbackRegistry::new(),
            statuses: CallbackRegistry::new(),
            errors: CallbackRegistry::new(),
            gate: ReentrantMutex::new(()),
            active_epoch: AtomicU64::new(0),
        }
    }

    pub(crate) fn subscribe_message(
        &self,
        callback: impl Fn(&PushMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.messages.subscribe(callback)
    }

    pub(crate) fn subscribe_status(
        &self,
        callback: impl Fn(&ConnectionState) + Send + Sync + 'static,
    ) -> Subscription {
        self.statuses.subscribe(callback)
    }

    pub(crate) fn subscribe_error(
        &self,
        callback: impl Fn(&StreamError) + Send + Sync + 'static,
    ) -> Subscription {
        self.errors.subscribe(callback)
    }

    /// Mark `epoch` as the only epoch allowed to dispatch channel events.
    pub(crate) fn set_active_epoch(&self, epoch: u64) {
        self.active_epoch.store(epoch, Ordering::SeqCst);
    }

    /// Barrier: returns once no channel-sourced dispatch batch is running.
    /// Reentrant, so it is safe to reach from inside a callback.
    pub(crate) fn quiesce(&self) {
        let _gate = self.gate.lock();
    }

    /// Dispatch a message sourced from the channel with epoch `epoch`.
    /// Returns false (dispatching nothing) when the epoch is stale.
    pub(crate) fn emit_message_gated(&self, epoch: u64, message: &PushMessage) -> bool {
        let _gate = self.gate.lock();
        if self.active_epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        self.messages.emit(message, "message");
        true
    }

    /// Dispatch a status event sourced from the channel with epoch `epoch`.
    pub(crate) fn emit_status_gated(&self, epoch: u64, state: ConnectionState) -> bool {
        let _gate = self.gate.lock();
        if self.active_epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        self.statuses.emit(&state, "status");
        true
    }

    /// Dispatch an error event sourced from the channel with epoch `epoch`.
    pub(crate) fn emit_error_gated(&self, epoch: u64, error: &StreamError) -> bool {
        let _gate = self.gate.lock();
        if self.active_epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        self.errors.emit(error, "error");
        true
    }

    /// Dispatch a caller-driven status event (connect/disconnect calls).
    pub(crate) fn emit_status(&self, state: ConnectionState) {
        let _gate = self.gate.lock();
        self.statuses.emit(&state, "status");
    }

    /// Dispatch a caller-driven error event (`send_error`).
    pub(crate) fn emit_error(&self, error: &StreamError) {
        let _gate = self.gate.lock();
        self.errors.emit(error, "error");
    }
}

//! Explicit observer registration.
//!
//! Change fan-out in this crate is modeled as ordered listener sets invoked
//! synchronously at the emit site; there is no global dispatcher. A
//! [`ListenerSet`] is a cloneable handle to one shared set of callbacks, and
//! every registration returns a [`Subscription`] guard that unregisters the
//! callback when dropped.

use std::sync::{
    Arc,
    Mutex,
    Weak,
};

use crate::types::SubscriptionId;

/// A registered listener callback.
type Listener<E> = Box<dyn FnMut(&E) + Send>;

/// Shared interior of a [`ListenerSet`].
struct Listeners<E> {
    /// Next subscription id to hand out.
    next_id: u64,
    /// Listeners in registration order.
    entries: Vec<(SubscriptionId, Listener<E>)>,
    /// True while a dispatch has checked the entries out of the lock.
    emitting: bool,
    /// Ids unsubscribed while a dispatch was in progress; applied when the
    /// checked-out entries are merged back.
    removed_during_emit: Vec<SubscriptionId>,
    /// Events emitted from within a callback; dispatched in order once the
    /// current dispatch completes.
    queued: Vec<E>,
}

/// An ordered set of listener callbacks invoked synchronously on
/// [`ListenerSet::emit`].
///
/// Subscribing or unsubscribing from within a callback is supported; a
/// listener registered during a dispatch is not invoked for the event that was
/// being dispatched. An emit performed from within a callback is queued and
/// delivered after the current dispatch completes, so no committed change goes
/// unannounced.
pub struct ListenerSet<E> {
    /// Shared listener storage.
    inner: Arc<Mutex<Listeners<E>>>,
}

impl<E> Clone for ListenerSet<E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<E> Default for ListenerSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for ListenerSet<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet").field("listeners", &self.len()).finish()
    }
}

impl<E> ListenerSet<E> {
    /// Creates an empty listener set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
                emitting: false,
                removed_during_emit: Vec::new(),
                queued: Vec::new(),
            })),
        }
    }

    /// Number of currently registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Locks the interior, recovering from poisoning.
    ///
    /// Listener state stays structurally valid even if a callback panicked
    /// mid-dispatch, so the poison flag carries no information here.
    fn lock(&self) -> std::sync::MutexGuard<'_, Listeners<E>> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Removes a listener by id.
    fn remove(inner: &Arc<Mutex<Listeners<E>>>, id: SubscriptionId) {
        let mut guard = inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.emitting {
            guard.removed_during_emit.push(id);
        }
        guard.entries.retain(|(entry_id, _)| *entry_id != id);
    }
}

impl<E: Send + 'static> ListenerSet<E> {
    /// Registers a listener, returning a guard that unregisters it on drop.
    #[must_use]
    pub fn subscribe(&self, listener: impl FnMut(&E) + Send + 'static) -> Subscription {
        let id = {
            let mut guard = self.lock();
            let id = SubscriptionId(guard.next_id);
            guard.next_id += 1;
            guard.entries.push((id, Box::new(listener)));
            id
        };

        let weak: Weak<Mutex<Listeners<E>>> = Arc::downgrade(&self.inner);
        Subscription {
            id,
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    Self::remove(&inner, id);
                }
            })),
        }
    }

    /// Invokes every registered listener with `event`, in registration order.
    ///
    /// The lock is not held while callbacks run, so listeners may freely call
    /// back into this crate. A listener unsubscribed by an earlier listener of
    /// the same dispatch is skipped. An emit performed from within a listener
    /// of the same set is queued and delivered, in order, once this dispatch
    /// has merged the entries back.
    pub fn emit(&self, event: &E)
    where
        E: Clone,
    {
        let mut checked_out = {
            let mut guard = self.lock();
            if guard.emitting {
                // Nested emit from within a listener: the outer dispatch owns
                // the entries and drains the queue when it finishes.
                guard.queued.push(event.clone());
                return;
            }
            guard.emitting = true;
            std::mem::take(&mut guard.entries)
        };

        for (id, listener) in &mut checked_out {
            let removed = self.lock().removed_during_emit.contains(id);
            if !removed {
                listener(event);
            }
        }

        let queued = {
            let mut guard = self.lock();
            let removed = std::mem::take(&mut guard.removed_during_emit);
            checked_out.retain(|(id, _)| !removed.contains(id));
            // Listeners registered during the dispatch were appended to the
            // inner vec; keep registration order across the merge.
            let added = std::mem::take(&mut guard.entries);
            checked_out.extend(added);
            guard.entries = checked_out;
            guard.emitting = false;
            std::mem::take(&mut guard.queued)
        };
        for event in queued {
            self.emit(&event);
        }
    }
}

/// Guard for one listener registration; dropping it unregisters the listener.
pub struct Subscription {
    /// Id of the registration, for diagnostics.
    id: SubscriptionId,
    /// Type-erased unregistration closure.
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// The id of this registration.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Unregisters immediately instead of waiting for drop.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{
        Arc,
        Mutex,
    };

    use googletest::prelude::*;

    use super::*;

    #[googletest::test]
    fn listeners_run_in_registration_order() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_a = Arc::clone(&seen);
        let _a = set.subscribe(move |e| seen_a.lock().unwrap().push(("a", *e)));
        let seen_b = Arc::clone(&seen);
        let _b = set.subscribe(move |e| seen_b.lock().unwrap().push(("b", *e)));

        set.emit(&7);

        assert_that!(*seen.lock().unwrap(), elements_are![eq(&("a", 7)), eq(&("b", 7))]);
    }

    #[googletest::test]
    fn dropping_subscription_unregisters() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let count = Arc::new(Mutex::new(0));

        let count_cb = Arc::clone(&count);
        let sub = set.subscribe(move |_| *count_cb.lock().unwrap() += 1);
        set.emit(&1);
        drop(sub);
        set.emit(&2);

        expect_that!(*count.lock().unwrap(), eq(1));
        expect_that!(set.len(), eq(0));
    }

    #[googletest::test]
    fn explicit_unsubscribe_unregisters() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let count = Arc::new(Mutex::new(0));

        let count_cb = Arc::clone(&count);
        let sub = set.subscribe(move |_| *count_cb.lock().unwrap() += 1);
        sub.unsubscribe();
        set.emit(&1);

        expect_that!(*count.lock().unwrap(), eq(0));
    }

    #[googletest::test]
    fn subscribe_during_dispatch_misses_current_event() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let count = Arc::new(Mutex::new(0));
        let late_subs = Arc::new(Mutex::new(Vec::new()));

        let set_inner = set.clone();
        let count_inner = Arc::clone(&count);
        let late_inner = Arc::clone(&late_subs);
        let _outer = set.subscribe(move |_| {
            let count_late = Arc::clone(&count_inner);
            let sub = set_inner.subscribe(move |_| *count_late.lock().unwrap() += 1);
            late_inner.lock().unwrap().push(sub);
        });

        set.emit(&1);
        expect_that!(*count.lock().unwrap(), eq(0));

        set.emit(&2);
        expect_that!(*count.lock().unwrap(), eq(1));
    }

    #[googletest::test]
    fn emit_from_within_a_listener_is_delivered_afterward() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let set_inner = set.clone();
        let _chain = set.subscribe(move |e: &u32| {
            if *e == 1 {
                set_inner.emit(&2);
            }
        });
        let seen_cb = Arc::clone(&seen);
        let _watch = set.subscribe(move |e: &u32| seen_cb.lock().unwrap().push(*e));

        set.emit(&1);

        // The nested event arrives as its own full dispatch, after the outer
        // one, to every listener.
        assert_that!(*seen.lock().unwrap(), elements_are![eq(&1), eq(&2)]);
    }

    #[googletest::test]
    fn unsubscribe_during_dispatch_skips_later_listener() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let count = Arc::new(Mutex::new(0));
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let victim_ref = Arc::clone(&victim);
        let _killer = set.subscribe(move |_| {
            if let Some(sub) = victim_ref.lock().unwrap().take() {
                sub.unsubscribe();
            }
        });
        let count_cb = Arc::clone(&count);
        let sub = set.subscribe(move |_| *count_cb.lock().unwrap() += 1);
        *victim.lock().unwrap() = Some(sub);

        set.emit(&1);
        set.emit(&2);

        expect_that!(*count.lock().unwrap(), eq(0));
        expect_that!(set.len(), eq(1));
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache event listeners.
//!
//! Listeners observe cache activity without being able to block it: they run
//! synchronously at notification points, panics are caught and logged, and a
//! listener that returns `true` from its callback is unsubscribed after that
//! event.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::object::CacheObject;

/// Observes space reservations being granted.
pub trait ReservationListener: Send + Sync {
    /// Called after a reservation has been recorded.  Return `true` to be
    /// unsubscribed.
    fn reservation_made(&self, volume: &str, size: i64) -> bool;
}

/// Observes objects arriving in the cache.
pub trait SaveListener: Send + Sync {
    /// Called after an object's bytes and record are both in place.  Return
    /// `true` to be unsubscribed.
    fn object_saved(&self, object: &CacheObject) -> bool;
}

/// Observes evictions.
pub trait DeletionListener: Send + Sync {
    /// Called after a deletion plan removed objects from a volume.  Return
    /// `true` to be unsubscribed.
    fn objects_deleted(&self, volume: &str, removed: &[CacheObject], freed: i64) -> bool;
}

/// An ordered set of listeners with promote-on-re-add semantics.
pub(crate) struct ListenerSet<L: ?Sized> {
    list: Mutex<Vec<Arc<L>>>,
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self {
            list: Mutex::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> ListenerSet<L> {
    /// Register a listener at the front of the notification order.
    /// Re-adding an already registered listener just moves it to the front.
    pub(crate) fn add(&self, listener: Arc<L>) {
        let mut list = self.list.lock();
        list.retain(|l| !Arc::ptr_eq(l, &listener));
        list.insert(0, listener);
    }

    pub(crate) fn remove(&self, listener: &Arc<L>) {
        self.list.lock().retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub(crate) fn len(&self) -> usize {
        self.list.lock().len()
    }

    /// Deliver one event to every listener.  The callback's `true` means
    /// "unsubscribe me"; a panicking listener is logged and kept.
    pub(crate) fn notify(&self, event: impl Fn(&L) -> bool) {
        let snapshot: Vec<Arc<L>> = self.list.lock().clone();
        let mut done = Vec::new();
        for listener in &snapshot {
            match catch_unwind(AssertUnwindSafe(|| event(listener))) {
                Ok(true) => done.push(Arc::clone(listener)),
                Ok(false) => {}
                Err(_) => error!("cache listener panicked during notification"),
            }
        }
        if !done.is_empty() {
            let mut list = self.list.lock();
            list.retain(|l| !done.iter().any(|d| Arc::ptr_eq(l, d)));
        }
    }
}

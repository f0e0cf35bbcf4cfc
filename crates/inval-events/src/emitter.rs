#![forbid(unsafe_code)]

//! Push broadcast point for single-threaded event delivery.
//!
//! An [`Emitter`] holds a list of receivers and delivers every sent event to
//! all of them synchronously, in registration order. Each subscription is
//! governed by an [`Interest`]; cancelling it removes the receiver. Finishing
//! the emitter cancels every receiver's interest with the finishing reason.
//!
//! # Invariants
//!
//! 1. `send` iterates a snapshot of the receiver list: receivers added or
//!    removed by a callback take effect for the next send, and a receiver
//!    whose interest was cancelled mid-send is skipped.
//! 2. `done` is idempotent; the first call's reason is delivered to every
//!    receiver's interest.
//! 3. Subscribing to a finished emitter registers nothing and returns an
//!    interest already cancelled with the finishing reason.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::interest::{CancelReason, Interest};

type Callback<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Receiver<T> {
    id: u64,
    callback: Callback<T>,
    interest: Interest,
}

struct EmitterInner<T> {
    receivers: Vec<Receiver<T>>,
    finished: Option<CancelReason>,
    next_id: u64,
}

/// A single-threaded push broadcast point.
///
/// Clones share state: they send to and subscribe against the same receiver
/// list.
pub struct Emitter<T> {
    inner: Rc<RefCell<EmitterInner<T>>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Emitter<T> {
    /// A fresh emitter with no receivers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(EmitterInner {
                receivers: Vec::new(),
                finished: None,
                next_id: 0,
            })),
        }
    }

    /// Register a receiver. Cancelling the returned interest removes it.
    ///
    /// If the emitter has already finished, nothing is registered and the
    /// returned interest is born cancelled with the finishing reason.
    pub fn subscribe(&self, callback: impl FnMut(&T) + 'static) -> Interest {
        let interest = {
            let mut inner = self.inner.borrow_mut();
            if let Some(reason) = inner.finished {
                return Interest::cancelled(reason);
            }
            let id = inner.next_id;
            inner.next_id += 1;
            let interest = Interest::new();
            inner.receivers.push(Receiver {
                id,
                callback: Rc::new(RefCell::new(callback)),
                interest: interest.clone(),
            });

            let weak = Rc::downgrade(&self.inner);
            interest.on_cancel(move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().receivers.retain(|r| r.id != id);
                }
            });
            interest
        };
        interest
    }

    /// Deliver `event` to every current receiver, in registration order.
    ///
    /// A finished emitter has no receivers, so sending to it is a no-op.
    pub fn send(&self, event: &T) {
        let snapshot: Vec<(Interest, Callback<T>)> = self
            .inner
            .borrow()
            .receivers
            .iter()
            .map(|r| (r.interest.clone(), Rc::clone(&r.callback)))
            .collect();

        for (interest, callback) in snapshot {
            if interest.is_cancelled() {
                continue;
            }
            (callback.borrow_mut())(event);
        }
    }

    /// Finish with [`CancelReason::SourceDone`].
    pub fn done(&self) {
        self.done_with(CancelReason::SourceDone);
    }

    /// Finish the emitter: drain all receivers and cancel each receiver's
    /// interest with `reason`. Idempotent.
    pub fn done_with(&self, reason: CancelReason) {
        let drained = {
            let mut inner = self.inner.borrow_mut();
            if inner.finished.is_some() {
                return;
            }
            inner.finished = Some(reason);
            std::mem::take(&mut inner.receivers)
        };
        trace!(receivers = drained.len(), ?reason, "emitter finished");
        for receiver in drained {
            receiver.interest.cancel_with(reason);
        }
    }

    /// Whether [`done`](Emitter::done) has been called.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.inner.borrow().finished.is_some()
    }

    /// Number of currently registered receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.inner.borrow().receivers.len()
    }

    /// This emitter viewed as an [`EventStream`].
    ///
    /// Subscribers see only events sent after they subscribe; there is no
    /// replay.
    #[must_use]
    pub fn stream(&self) -> crate::stream::EventStream<T> {
        let emitter = self.clone();
        crate::stream::EventStream::new(move |callback| emitter.subscribe(callback))
    }
}

impl<T: 'static> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#![forbid(unsafe_code)]

//! The uniform subscribable shape.
//!
//! An [`EventStream`] is just a shared subscribe function: give it a
//! callback, get back an [`Interest`] governing the subscription. Whether
//! subscribing replays a current value immediately (keeper semantics) or only
//! delivers later events is up to the stream's constructor; consumers must
//! tolerate both.

use std::rc::Rc;

use crate::interest::Interest;

type SubscribeFn<T> = dyn Fn(Box<dyn FnMut(&T)>) -> Interest;

/// A subscribable source of `&T` events.
///
/// Clones share the underlying subscribe function; [`ptr_eq`] compares that
/// identity.
///
/// [`ptr_eq`]: EventStream::ptr_eq
pub struct EventStream<T> {
    subscribe_fn: Rc<SubscribeFn<T>>,
}

impl<T> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            subscribe_fn: Rc::clone(&self.subscribe_fn),
        }
    }
}

impl<T: 'static> EventStream<T> {
    /// Build a stream from a subscribe function.
    ///
    /// The function is invoked once per [`subscribe`](EventStream::subscribe)
    /// call and must return the interest governing that subscription.
    pub fn new(subscribe_fn: impl Fn(Box<dyn FnMut(&T)>) -> Interest + 'static) -> Self {
        Self {
            subscribe_fn: Rc::new(subscribe_fn),
        }
    }

    /// Subscribe a callback. Cancelling the returned interest ends delivery.
    pub fn subscribe(&self, callback: impl FnMut(&T) + 'static) -> Interest {
        (self.subscribe_fn)(Box::new(callback))
    }

    /// Whether two handles refer to the same underlying stream.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.subscribe_fn, &other.subscribe_fn)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#![forbid(unsafe_code)]

//! Value holders.
//!
//! The engine consumes its value holder only through [`ReadValue`]: a stream
//! of the current value and every subsequent change. [`InValue`] is the
//! minimal concrete holder for applications (and tests) that do not bring a
//! richer control layer of their own.

use std::cell::RefCell;
use std::rc::Rc;

use inval_events::{Emitter, EventStream};

/// Read access to a mutable value holder.
///
/// [`read`](ReadValue::read) yields keeper-semantics streams: every
/// subscriber first receives the holder's current value immediately, then
/// every subsequent value.
pub trait ReadValue {
    /// The held value type.
    type Value: 'static;

    /// Stream of the current value and all later changes.
    fn read(&self) -> EventStream<Self::Value>;
}

struct ValueCell<V> {
    value: V,
    changes: Emitter<V>,
}

/// A minimal observable value holder.
///
/// Clones are handles to the same value. Setting an equal value is a no-op:
/// no change notification fires.
pub struct InValue<V> {
    cell: Rc<RefCell<ValueCell<V>>>,
}

impl<V> Clone for InValue<V> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<V: Clone + PartialEq + 'static> InValue<V> {
    /// Create a holder with an initial value.
    #[must_use]
    pub fn new(value: V) -> Self {
        Self {
            cell: Rc::new(RefCell::new(ValueCell {
                value,
                changes: Emitter::new(),
            })),
        }
    }

    /// The current value.
    #[must_use]
    pub fn get(&self) -> V {
        self.cell.borrow().value.clone()
    }

    /// Replace the value, notifying change subscribers.
    ///
    /// Setting a value equal to the current one does nothing.
    pub fn set(&self, value: V) {
        let changes = {
            let mut cell = self.cell.borrow_mut();
            if cell.value == value {
                return;
            }
            cell.value = value.clone();
            cell.changes.clone()
        };
        changes.send(&value);
    }
}

impl<V: Clone + PartialEq + 'static> ReadValue for InValue<V> {
    type Value = V;

    fn read(&self) -> EventStream<V> {
        let holder = self.clone();
        EventStream::new(move |mut callback| {
            let current = holder.get();
            callback(&current);
            let changes = holder.cell.borrow().changes.clone();
            changes.subscribe(callback)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

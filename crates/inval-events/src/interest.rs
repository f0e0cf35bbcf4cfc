#![forbid(unsafe_code)]

//! Cancellable interest tokens.
//!
//! An [`Interest`] represents one live subscription or attachment. It can be
//! cancelled with a [`CancelReason`], runs registered cleanup actions exactly
//! once, and can be chained so that cancelling a dependency cancels its
//! dependents.
//!
//! # Invariants
//!
//! 1. Cancellation is idempotent: only the first call's reason is stored and
//!    delivered; later calls are no-ops.
//! 2. Cleanup actions run after the state flips to cancelled, so reentrant
//!    cancellation observed from inside an action is a no-op.
//! 3. An action registered on an already-cancelled interest runs immediately
//!    with the stored reason.
//! 4. [`needs`](Interest::needs) is asymmetric: cancelling the dependency
//!    cancels the dependent, never the other way around.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Why an [`Interest`] was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Ordinary explicit cancellation.
    Cancelled,
    /// The underlying event source finished on its own.
    SourceDone,
    /// Internal unlink. Cleanup actions that see this reason must not cascade
    /// removal; it exists to detach a link without re-entering the
    /// bookkeeping that cancellation normally drives.
    Unlink,
}

type CancelAction = Box<dyn FnOnce(&CancelReason)>;

enum State {
    Active { actions: Vec<CancelAction> },
    Cancelled(CancelReason),
}

/// A cloneable handle for one live subscription or attachment.
///
/// Clones share state: cancelling any clone cancels them all. Dropping an
/// `Interest` does nothing; cancellation is always explicit.
#[derive(Clone)]
pub struct Interest {
    state: Rc<RefCell<State>>,
}

impl Interest {
    /// A fresh, active interest with no cleanup actions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State::Active {
                actions: Vec::new(),
            })),
        }
    }

    /// An interest that is already cancelled with the given reason.
    ///
    /// Used by sources that have finished before a subscription was
    /// attempted.
    #[must_use]
    pub fn cancelled(reason: CancelReason) -> Self {
        Self {
            state: Rc::new(RefCell::new(State::Cancelled(reason))),
        }
    }

    /// Whether this interest has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(&*self.state.borrow(), State::Cancelled(_))
    }

    /// The cancellation reason, if cancelled.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        match &*self.state.borrow() {
            State::Cancelled(reason) => Some(*reason),
            State::Active { .. } => None,
        }
    }

    /// Cancel with [`CancelReason::Cancelled`].
    pub fn cancel(&self) {
        self.cancel_with(CancelReason::Cancelled);
    }

    /// Cancel with the given reason.
    ///
    /// The first call flips the state and runs every registered cleanup
    /// action with `reason`; all later calls are no-ops regardless of reason.
    /// Actions run outside the internal borrow, so they may call back into
    /// this interest freely.
    pub fn cancel_with(&self, reason: CancelReason) {
        let actions = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                State::Cancelled(_) => return,
                State::Active { actions } => {
                    let drained = std::mem::take(actions);
                    *state = State::Cancelled(reason);
                    drained
                }
            }
        };
        for action in actions {
            action(&reason);
        }
    }

    /// Register a cleanup action to run once on cancellation.
    ///
    /// If the interest is already cancelled, the action runs immediately with
    /// the stored reason. Actions run in registration order.
    pub fn on_cancel(&self, action: impl FnOnce(&CancelReason) + 'static) -> &Self {
        let stored = match &*self.state.borrow() {
            State::Cancelled(reason) => Some(*reason),
            State::Active { .. } => None,
        };
        match stored {
            Some(reason) => action(&reason),
            None => {
                if let State::Active { actions } = &mut *self.state.borrow_mut() {
                    actions.push(Box::new(action));
                }
            }
        }
        self
    }

    /// Make this interest depend on `other`: cancelling `other` cancels
    /// `self` with the forwarded reason. Cancelling `self` does not affect
    /// `other`.
    pub fn needs(&self, other: &Interest) -> &Self {
        let dependent = self.clone();
        other.on_cancel(move |reason| dependent.cancel_with(*reason));
        self
    }
}

impl Default for Interest {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interest")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#![forbid(unsafe_code)]

//! Interest tokens and single-threaded push-event primitives.
//!
//! This crate provides the subscription substrate for the `inval` validation
//! engine:
//!
//! - [`Interest`]: A cancellable handle representing one live subscription or
//!   attachment, with idempotent, reason-carrying cancellation and dependency
//!   chaining.
//! - [`Emitter`]: A push broadcast point delivering events to every current
//!   receiver.
//! - [`EventStream`]: The uniform subscribable shape produced by adapters and
//!   consumed by downstream machinery.
//!
//! # Architecture
//!
//! Everything here is single-threaded: state lives in `Rc<RefCell<..>>`, all
//! propagation is synchronous push, and nothing blocks or defers. Code that
//! needs these primitives from multiple threads must confine each instance to
//! one logical task.
//!
//! # Invariants
//!
//! 1. An [`Interest`]'s cleanup actions run exactly once, with the first
//!    cancellation's reason, no matter how many times or from how many paths
//!    cancellation is requested.
//! 2. [`Emitter`] delivers events to receivers in registration order, against
//!    a snapshot of the receiver list taken at send time.
//! 3. Finishing an emitter cancels every receiver's interest with the
//!    finishing reason; later subscriptions are born cancelled.

pub mod emitter;
pub mod interest;
pub mod stream;

pub use emitter::Emitter;
pub use interest::{CancelReason, Interest};
pub use stream::EventStream;

#![forbid(unsafe_code)]

//! Reactive input-validation aggregation.
//!
//! Any number of independently-lifetimed validators attach to one value
//! holder and contribute zero or more messages; the [`Aggregator`] merges
//! them into one live, ordered result that exists only while someone is
//! reading it.
//!
//! - [`Validator`]: A message source in one of three shapes — a ready
//!   stream, a factory over the holder, or a synchronous
//!   [`SimpleValidator`] re-run on every value change.
//! - [`Aggregator`]: The per-holder engine. Attach validators with
//!   [`attach`](Aggregator::attach), read the merged result with
//!   [`subscribe`](Aggregator::subscribe).
//! - [`require_all`]: Combine several validators into one.
//! - [`InValue`]: A minimal observable value holder implementing
//!   [`ReadValue`].
//!
//! Message content is opaque to the engine: it stores and forwards arrays of
//! an application-defined `M` and never inspects them.
//!
//! # Example
//!
//! ```
//! use inval::{Aggregator, InValue, Validator};
//!
//! let name = InValue::new(String::new());
//! let validation: Aggregator<_, &str> = Aggregator::new(name.clone());
//!
//! let required = validation.attach(Validator::simple(|holder: &InValue<String>| {
//!     if holder.get().is_empty() {
//!         vec!["name is required"]
//!     } else {
//!         Vec::new()
//!     }
//! }));
//!
//! let subscription = validation.subscribe(|messages| {
//!     println!("currently invalid: {messages:?}");
//! });
//!
//! name.set("Ada".to_owned()); // revalidates, broadcasts the empty result
//! subscription.cancel();
//! required.cancel();
//! ```

pub mod aggregate;
pub mod holder;
pub mod require_all;
pub mod validator;

pub use aggregate::Aggregator;
pub use holder::{InValue, ReadValue};
pub use inval_events::{CancelReason, Emitter, EventStream, Interest};
pub use require_all::{require_all, require_nothing};
pub use validator::{SimpleValidator, Validator};

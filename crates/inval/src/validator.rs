#![forbid(unsafe_code)]

//! Validator shapes and normalization.
//!
//! A [`Validator`] is one of three shapes: a ready message stream, a factory
//! over the holder, or a synchronous [`SimpleValidator`]. All three are
//! resolved to one uniform [`EventStream`] of message arrays at attach time;
//! no runtime shape probing happens anywhere downstream.

use std::rc::Rc;

use inval_events::EventStream;

use crate::holder::ReadValue;

/// A synchronous validator, invoked on every holder value change.
///
/// The returned vector carries the validator's current messages; an empty
/// vector means the input is valid. A blanket impl covers plain
/// `Fn(&H) -> Vec<M>` closures.
///
/// A panicking `validate` is outside the engine's contract: the panic
/// propagates to whoever mutated the holder's value.
pub trait SimpleValidator<H, M> {
    /// Validate the holder's current value.
    fn validate(&self, holder: &H) -> Vec<M>;
}

impl<H, M, F> SimpleValidator<H, M> for F
where
    F: Fn(&H) -> Vec<M>,
{
    fn validate(&self, holder: &H) -> Vec<M> {
        self(holder)
    }
}

/// A source of validation messages for a value holder.
///
/// Cloning is cheap: streams and boxed shapes are `Rc`-shared.
pub enum Validator<H, M> {
    /// A ready message stream, used as-is.
    Stream(EventStream<Vec<M>>),
    /// A factory invoked once with the holder at attach time.
    Factory(Rc<dyn Fn(&H) -> EventStream<Vec<M>>>),
    /// A synchronous validator re-run on each value change.
    Simple(Rc<dyn SimpleValidator<H, M>>),
}

impl<H, M> Clone for Validator<H, M> {
    fn clone(&self) -> Self {
        match self {
            Self::Stream(stream) => Self::Stream(stream.clone()),
            Self::Factory(factory) => Self::Factory(Rc::clone(factory)),
            Self::Simple(simple) => Self::Simple(Rc::clone(simple)),
        }
    }
}

impl<H, M> Validator<H, M> {
    /// A validator backed by a ready message stream.
    pub fn stream(stream: EventStream<Vec<M>>) -> Self {
        Self::Stream(stream)
    }

    /// A validator built from a factory over the holder.
    pub fn factory(factory: impl Fn(&H) -> EventStream<Vec<M>> + 'static) -> Self {
        Self::Factory(Rc::new(factory))
    }

    /// A validator wrapping a synchronous [`SimpleValidator`].
    pub fn simple(validator: impl SimpleValidator<H, M> + 'static) -> Self {
        Self::Simple(Rc::new(validator))
    }
}

/// Resolve a validator's shape to the uniform message-stream form.
///
/// `Stream` passes through, `Factory` is invoked once with the holder, and
/// `Simple` is driven by the holder's `read()` stream: every value event
/// (including the immediate current-value replay) re-runs `validate` and
/// emits the resulting array. None of the shapes is assumed to deliver a
/// first array synchronously; the aggregator treats "no array yet" as empty.
pub(crate) fn normalize<H, M>(holder: &H, validator: Validator<H, M>) -> EventStream<Vec<M>>
where
    H: ReadValue + Clone + 'static,
    M: Clone + 'static,
{
    match validator {
        Validator::Stream(stream) => stream,
        Validator::Factory(factory) => factory(holder),
        Validator::Simple(simple) => {
            let holder = holder.clone();
            EventStream::new(move |mut callback| {
                let holder_for_events = holder.clone();
                let simple = Rc::clone(&simple);
                holder.read().subscribe(move |_value: &H::Value| {
                    let messages = simple.validate(&holder_for_events);
                    callback(&messages);
                })
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holder::InValue;
    use inval_events::Emitter;
    use std::cell::RefCell;

    #[test]
    fn normalize_passes_ready_stream_through() {
        let holder = InValue::new(0);
        let emitter: Emitter<Vec<&'static str>> = Emitter::new();
        let original = emitter.stream();

        let normalized = normalize(&holder, Validator::stream(original.clone()));

        assert!(normalized.ptr_eq(&original));
    }

    #[test]
    fn normalize_invokes_factory_with_holder() {
        let holder = InValue::new(41);
        let captured = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&captured);

        let validator = Validator::factory(move |h: &InValue<i32>| {
            *slot.borrow_mut() = Some(h.get());
            let emitter: Emitter<Vec<&'static str>> = Emitter::new();
            emitter.stream()
        });
        let _normalized = normalize(&holder, validator);

        assert_eq!(*captured.borrow(), Some(41));
    }

    #[test]
    fn simple_validator_runs_on_subscribe_and_on_change() {
        let holder = InValue::new(String::from("ok"));
        let validator = Validator::simple(|h: &InValue<String>| {
            if h.get().is_empty() {
                vec!["empty"]
            } else {
                Vec::new()
            }
        });

        let stream = normalize(&holder, validator);
        let seen: Rc<RefCell<Vec<Vec<&'static str>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _interest = stream.subscribe(move |messages| sink.borrow_mut().push(messages.clone()));

        holder.set(String::new());
        holder.set(String::from("filled"));

        let seen = seen.borrow();
        assert_eq!(*seen, vec![Vec::new(), vec!["empty"], Vec::new()]);
    }

    #[test]
    fn each_normalized_subscription_revalidates_independently() {
        let holder = InValue::new(1);
        let runs = Rc::new(RefCell::new(0u32));
        let counter = Rc::clone(&runs);
        let validator = Validator::simple(move |_h: &InValue<i32>| {
            *counter.borrow_mut() += 1;
            Vec::<&'static str>::new()
        });

        let stream = normalize(&holder, validator);
        let _first = stream.subscribe(|_| {});
        let _second = stream.subscribe(|_| {});

        assert_eq!(*runs.borrow(), 2); // one immediate run per subscription

        holder.set(2);
        assert_eq!(*runs.borrow(), 4);
    }
}

#![forbid(unsafe_code)]

//! Validator combinators.
//!
//! [`require_all`] builds a "all of these must pass" validator out of several
//! validators of the same shape. Zero validators requires nothing, one
//! validator is returned as-is, and more than one are merged through a
//! per-call [`Aggregator`].

use inval_events::{CancelReason, EventStream, Interest};

use crate::aggregate::Aggregator;
use crate::holder::ReadValue;
use crate::validator::Validator;

/// A validator that never reports any message.
#[must_use]
pub fn require_nothing<H: 'static, M: 'static>() -> Validator<H, M> {
    Validator::simple(|_holder: &H| Vec::new())
}

/// Require that all of the given validators pass.
///
/// - No validators: returns [`require_nothing`].
/// - Exactly one: returns it unchanged, preserving its identity (no wrapping
///   overhead).
/// - More than one: returns a factory validator that builds a fresh
///   aggregator over the holder, attaches every given validator to it, and
///   exposes the merged stream. Cancelling a subscription to that stream
///   cancels the inner attachments with the same reason — except for
///   [`CancelReason::Unlink`], the internal detach used by an enclosing
///   aggregator's live→dormant transition, which must leave the inner
///   attachments (and their held state) intact.
pub fn require_all<H, M>(validators: impl IntoIterator<Item = Validator<H, M>>) -> Validator<H, M>
where
    H: ReadValue + Clone + 'static,
    M: Clone + 'static,
{
    let mut validators: Vec<_> = validators.into_iter().collect();
    match validators.len() {
        0 => require_nothing(),
        1 => validators.remove(0),
        _ => Validator::factory(move |holder: &H| combined_stream(holder, &validators)),
    }
}

fn combined_stream<H, M>(holder: &H, validators: &[Validator<H, M>]) -> EventStream<Vec<M>>
where
    H: ReadValue + Clone + 'static,
    M: Clone + 'static,
{
    let aggregator = Aggregator::new(holder.clone());
    let attachments: Vec<Interest> = validators
        .iter()
        .map(|validator| aggregator.attach(validator.clone()))
        .collect();
    let merged = aggregator.stream();

    EventStream::new(move |callback| {
        let subscription = merged.subscribe(callback);
        let attachments = attachments.clone();
        subscription.on_cancel(move |reason| {
            if *reason != CancelReason::Unlink {
                for attachment in &attachments {
                    attachment.cancel_with(*reason);
                }
            }
        });
        subscription
    })
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
    use std::rc::Rc;

    type Msg = &'static str;
    type Log = Rc<RefCell<Vec<Vec<Msg>>>>;

    fn recording(validation: &Aggregator<InValue<i32>, Msg>) -> (Log, Interest) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let subscription =
            validation.subscribe(move |messages| sink.borrow_mut().push(messages.to_vec()));
        (log, subscription)
    }

    #[test]
    fn returns_the_only_validator() {
        let emitter: Emitter<Vec<Msg>> = Emitter::new();
        let stream = emitter.stream();
        let combined = require_all::<InValue<i32>, Msg>(vec![Validator::stream(stream.clone())]);

        match combined {
            Validator::Stream(inner) => assert!(inner.ptr_eq(&stream)),
            _ => panic!("single validator must be returned unchanged"),
        }
    }

    #[test]
    fn requires_nothing_for_empty_list() {
        let holder = InValue::new(0);
        let validation: Aggregator<InValue<i32>, Msg> = Aggregator::new(holder.clone());
        let _v = validation.attach(require_all(Vec::new()));
        let (log, _sub) = recording(&validation);

        holder.set(1);
        holder.set(2);

        // Only the initial empty snapshot; revalidation never produces
        // messages, and empty-over-absent updates are suppressed.
        assert_eq!(*log.borrow(), vec![Vec::<Msg>::new()]);
    }

    #[test]
    fn sends_messages_from_all_validators() {
        let validation: Aggregator<InValue<i32>, Msg> = Aggregator::new(InValue::new(0));
        let first = Emitter::new();
        let second = Emitter::new();
        let _all = validation.attach(require_all(vec![
            Validator::stream(first.stream()),
            Validator::stream(second.stream()),
        ]));
        let (log, _sub) = recording(&validation);

        first.send(&vec!["message 1"]);
        second.send(&vec!["message 2"]);

        assert_eq!(log.borrow().last().unwrap(), &vec!["message 1", "message 2"]);
    }

    #[test]
    fn sends_messages_when_one_validator_removed() {
        let validation: Aggregator<InValue<i32>, Msg> = Aggregator::new(InValue::new(0));
        let first = Emitter::new();
        let second = Emitter::new();
        let _all = validation.attach(require_all(vec![
            Validator::stream(first.stream()),
            Validator::stream(second.stream()),
        ]));
        let (log, _sub) = recording(&validation);

        first.send(&vec!["message 1"]);
        second.send(&vec!["message 2"]);
        second.done();

        assert_eq!(log.borrow().last().unwrap(), &vec!["message 1"]);

        first.send(&vec!["message 3"]);
        assert_eq!(log.borrow().last().unwrap(), &vec!["message 3"]);
    }

    #[test]
    fn stops_sending_when_last_validator_removed() {
        let validation: Aggregator<InValue<i32>, Msg> = Aggregator::new(InValue::new(0));
        let first = Emitter::new();
        let second = Emitter::new();
        let _all = validation.attach(require_all(vec![
            Validator::stream(first.stream()),
            Validator::stream(second.stream()),
        ]));
        let (log, _sub) = recording(&validation);

        first.send(&vec!["message 1"]);
        second.send(&vec!["message 2"]);
        first.done();
        second.done();

        assert!(log.borrow().last().unwrap().is_empty());

        let before = log.borrow().len();
        first.send(&vec!["message 3"]);
        assert_eq!(log.borrow().len(), before);
    }

    #[test]
    fn detaching_the_combined_validator_detaches_inner_ones() {
        let validation: Aggregator<InValue<i32>, Msg> = Aggregator::new(InValue::new(0));
        let first: Emitter<Vec<Msg>> = Emitter::new();
        let second: Emitter<Vec<Msg>> = Emitter::new();
        let all = validation.attach(require_all(vec![
            Validator::stream(first.stream()),
            Validator::stream(second.stream()),
        ]));
        let (log, _sub) = recording(&validation);

        first.send(&vec!["message 1"]);
        all.cancel();

        assert!(log.borrow().last().unwrap().is_empty());
        assert_eq!(first.receiver_count(), 0);
        assert_eq!(second.receiver_count(), 0);
    }

    #[test]
    fn combined_state_survives_subscriber_churn() {
        let validation: Aggregator<InValue<i32>, Msg> = Aggregator::new(InValue::new(0));
        let first = Emitter::new();
        let second = Emitter::new();
        let _all = validation.attach(require_all(vec![
            Validator::stream(first.stream()),
            Validator::stream(second.stream()),
        ]));
        let (log, subscription) = recording(&validation);

        first.send(&vec!["message 1"]);
        assert_eq!(log.borrow().last().unwrap(), &vec!["message 1"]);

        subscription.cancel();
        let (next_log, _next) = recording(&validation);

        assert_eq!(*next_log.borrow(), vec![vec!["message 1"]]);

        second.send(&vec!["message 2"]);
        assert_eq!(
            next_log.borrow().last().unwrap(),
            &vec!["message 1", "message 2"]
        );
    }

    #[test]
    fn nested_require_all_merges_in_order() {
        let validation: Aggregator<InValue<i32>, Msg> = Aggregator::new(InValue::new(0));
        let a = Emitter::new();
        let b = Emitter::new();
        let c = Emitter::new();
        let inner = require_all(vec![
            Validator::stream(b.stream()),
            Validator::stream(c.stream()),
        ]);
        let _all = validation.attach(require_all(vec![Validator::stream(a.stream()), inner]));
        let (log, _sub) = recording(&validation);

        c.send(&vec!["c"]);
        a.send(&vec!["a"]);
        b.send(&vec!["b"]);

        assert_eq!(log.borrow().last().unwrap(), &vec!["a", "b", "c"]);
    }
}

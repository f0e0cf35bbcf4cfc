#![forbid(unsafe_code)]

//! The per-holder message aggregation engine.
//!
//! An [`Aggregator`] owns the set of attached validators, normalized to
//! message streams, and merges their currently-held message arrays into one
//! ordered result. It is demand-driven: forwarding from sources and the
//! broadcast machinery exist only while at least one subscriber reads the
//! merged stream. Attached validators survive subscriber churn.
//!
//! # States
//!
//! - **Dormant**: no subscriber. Sources are registered but not forwarded;
//!   held arrays from the last live period are retained.
//! - **Live**: ≥1 subscriber. Every source has a forwarding link; each
//!   incoming array updates the source's held entry and triggers one
//!   recomputation-and-broadcast of the merged result.
//!
//! # Invariants
//!
//! 1. The merged result is the concatenation of each source's held non-empty
//!    array, in attachment order, stable across recomputation.
//! 2. An empty incoming array for a source with no held entry is suppressed:
//!    no broadcast fires (prevents empty-to-empty churn at startup).
//! 3. Detaching a source broadcasts exactly once, and only if it held a
//!    non-empty array while live; dormant detach is silent.
//! 4. Live→dormant cancels forwarding links with [`CancelReason::Unlink`],
//!    never the attachments themselves.
//! 5. Broadcasts happen with no internal borrow held, so subscriber
//!    callbacks may attach, detach, and subscribe reentrantly.
//!
//! # Failure Modes
//!
//! - **Aggregator dropped while subscriptions are held**: outstanding
//!   interests hold only weak references; cancelling them later is a no-op.
//! - **Simple validator panics during revalidation**: the panic propagates
//!   to the caller that mutated the holder's value; the engine does not
//!   catch it.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

use inval_events::{CancelReason, Emitter, EventStream, Interest};

use crate::holder::ReadValue;
use crate::validator::{Validator, normalize};

/// Identifier of one attached source, unique within its aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SourceId(u64);

/// One attached validator, normalized.
struct Source<M> {
    id: SourceId,
    stream: EventStream<Vec<M>>,
    /// Last non-empty array reported by this source. `None` contributes
    /// nothing to the merge.
    held: Option<Vec<M>>,
    /// Holding interest returned by `attach`; cancelling it detaches the
    /// source.
    attachment: Interest,
    /// Forwarding link, present exactly while the aggregator is live.
    link: Option<Interest>,
}

/// Broadcast machinery, present exactly while ≥1 subscriber is attached.
struct Live<M> {
    broadcast: Emitter<Vec<M>>,
    subscribers: usize,
}

struct AggregatorState<M> {
    /// Attachment order is merge order.
    sources: Vec<Source<M>>,
    live: Option<Live<M>>,
    next_id: u64,
}

/// The per-holder validation aggregation engine.
///
/// Clones are handles to the same engine. One aggregator instance exists per
/// value holder and lives as long as the holder does; the broadcast
/// machinery inside it comes and goes with subscriber demand.
pub struct Aggregator<H, M> {
    holder: H,
    state: Rc<RefCell<AggregatorState<M>>>,
}

impl<H: Clone, M> Clone for Aggregator<H, M> {
    fn clone(&self) -> Self {
        Self {
            holder: self.holder.clone(),
            state: Rc::clone(&self.state),
        }
    }
}

impl<H, M> Aggregator<H, M>
where
    H: ReadValue + Clone + 'static,
    M: Clone + 'static,
{
    /// Create an aggregator over a holder handle.
    pub fn new(holder: H) -> Self {
        Self {
            holder,
            state: Rc::new(RefCell::new(AggregatorState {
                sources: Vec::new(),
                live: None,
                next_id: 0,
            })),
        }
    }

    /// Attach a validator.
    ///
    /// The validator's shape is normalized once, here. The returned interest
    /// holds the attachment: cancelling it stops forwarding, removes the
    /// source, and — only if the source held a non-empty array while live —
    /// triggers one final broadcast so subscribers observe the messages
    /// disappearing. While dormant, removal is silent.
    pub fn attach(&self, validator: Validator<H, M>) -> Interest {
        let stream = normalize(&self.holder, validator);
        let attachment = Interest::new();
        let id = {
            let mut state = self.state.borrow_mut();
            let id = SourceId(state.next_id);
            state.next_id += 1;
            state.sources.push(Source {
                id,
                stream,
                held: None,
                attachment: attachment.clone(),
                link: None,
            });
            id
        };
        trace!(source = id.0, "validator attached");

        let weak = Rc::downgrade(&self.state);
        attachment.on_cancel(move |reason| {
            if let Some(state) = weak.upgrade() {
                detach_source(&state, id, reason);
            }
        });

        let is_live = self.state.borrow().live.is_some();
        if is_live {
            start_forwarding(&self.state, id);
        }
        attachment
    }

    /// Subscribe to the merged result.
    ///
    /// The callback is invoked once immediately with the current merged
    /// snapshot (possibly empty), and thereafter on every change, until the
    /// returned interest is cancelled. The first subscriber switches the
    /// aggregator live; the last one's departure tears the broadcast
    /// machinery back down.
    pub fn subscribe(&self, mut callback: impl FnMut(&[M]) + 'static) -> Interest {
        self.subscribe_raw(Box::new(move |messages: &Vec<M>| callback(messages)))
    }

    fn subscribe_raw(&self, mut callback: Box<dyn FnMut(&Vec<M>)>) -> Interest {
        self.go_live_if_needed();

        let (emitter, snapshot) = {
            let mut state = self.state.borrow_mut();
            let snapshot = merged_of(&state);
            let live = state
                .live
                .as_mut()
                .expect("broadcast machinery exists while subscribing");
            live.subscribers += 1;
            (live.broadcast.clone(), snapshot)
        };

        callback(&snapshot);
        let receiver = emitter.subscribe(callback);

        let subscription = Interest::new();
        let weak = Rc::downgrade(&self.state);
        subscription.on_cancel(move |reason| {
            receiver.cancel_with(*reason);
            if let Some(state) = weak.upgrade() {
                drop_subscriber(&state);
            }
        });
        subscription
    }

    /// The merged result, readable as an event stream.
    ///
    /// Subscribing through the stream is identical to
    /// [`subscribe`](Aggregator::subscribe): current snapshot first, then
    /// every change. The stream keeps the aggregator alive.
    #[must_use]
    pub fn stream(&self) -> EventStream<Vec<M>> {
        let aggregator = self.clone();
        EventStream::new(move |callback| aggregator.subscribe_raw(callback))
    }

    /// Current merged snapshot, in attachment order.
    ///
    /// Reflects the last forwarded state; while dormant, arrays held at the
    /// end of the previous live period.
    #[must_use]
    pub fn current(&self) -> Vec<M> {
        merged_of(&self.state.borrow())
    }

    /// Number of currently attached validators.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.state.borrow().sources.len()
    }

    /// Whether at least one subscriber is reading the merged stream.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state.borrow().live.is_some()
    }

    fn go_live_if_needed(&self) {
        let ids: Vec<SourceId> = {
            let mut state = self.state.borrow_mut();
            if state.live.is_some() {
                return;
            }
            state.live = Some(Live {
                broadcast: Emitter::new(),
                subscribers: 0,
            });
            state.sources.iter().map(|s| s.id).collect()
        };
        debug!(sources = ids.len(), "validation went live");

        // Forwarding setup may synchronously emit and mutate the source set
        // (keeper streams fire immediately, finished streams detach), so
        // iterate over a snapshot of ids and re-check presence per source.
        for id in ids {
            start_forwarding(&self.state, id);
        }
    }
}

/// Begin forwarding one source's normalized stream into the merge.
fn start_forwarding<M: Clone + 'static>(state_rc: &Rc<RefCell<AggregatorState<M>>>, id: SourceId) {
    let (stream, attachment) = {
        let state = state_rc.borrow();
        let Some(source) = state.sources.iter().find(|s| s.id == id) else {
            return;
        };
        (source.stream.clone(), source.attachment.clone())
    };

    let weak = Rc::downgrade(state_rc);
    let link = stream.subscribe(move |messages: &Vec<M>| {
        let Some(state_rc) = weak.upgrade() else {
            return;
        };
        let changed = {
            let mut state = state_rc.borrow_mut();
            let Some(source) = state.sources.iter_mut().find(|s| s.id == id) else {
                return;
            };
            if messages.is_empty() {
                // Nothing removed means nothing to re-broadcast.
                source.held.take().is_some()
            } else {
                source.held = Some(messages.clone());
                true
            }
        };
        if changed {
            broadcast(&state_rc);
        }
    });

    // A stream that finishes on its own detaches its validator — unless the
    // link was unlinked internally (dormancy keeps attachments alive).
    link.on_cancel({
        let attachment = attachment.clone();
        move |reason| {
            if *reason != CancelReason::Unlink {
                attachment.cancel_with(*reason);
            }
        }
    });

    let stored = {
        let mut state = state_rc.borrow_mut();
        match state.sources.iter_mut().find(|s| s.id == id) {
            Some(source) => {
                source.link = Some(link.clone());
                true
            }
            None => false,
        }
    };
    if !stored {
        // The source detached while its stream was being subscribed.
        link.cancel_with(attachment.reason().unwrap_or(CancelReason::Unlink));
    }
}

/// Remove a source; broadcast once if it was contributing while live.
fn detach_source<M: Clone + 'static>(
    state_rc: &Rc<RefCell<AggregatorState<M>>>,
    id: SourceId,
    reason: &CancelReason,
) {
    let (link, had_messages, live) = {
        let mut state = state_rc.borrow_mut();
        let Some(index) = state.sources.iter().position(|s| s.id == id) else {
            return;
        };
        let source = state.sources.remove(index);
        (source.link, source.held.is_some(), state.live.is_some())
    };
    if let Some(link) = link {
        // Forward the detach reason: a link cancelled for any reason other
        // than Unlink is a real teardown, and dependent machinery (such as a
        // combined validator's inner attachments) must observe it.
        link.cancel_with(*reason);
    }
    trace!(source = id.0, ?reason, "validator detached");
    if had_messages && live {
        broadcast(state_rc);
    }
}

/// One subscriber departed; tear the broadcast machinery down at zero.
fn drop_subscriber<M: Clone + 'static>(state_rc: &Rc<RefCell<AggregatorState<M>>>) {
    let links: Vec<Interest> = {
        let mut state = state_rc.borrow_mut();
        let Some(live) = state.live.as_mut() else {
            return;
        };
        live.subscribers = live.subscribers.saturating_sub(1);
        if live.subscribers > 0 {
            return;
        }
        state.live = None;
        state
            .sources
            .iter_mut()
            .filter_map(|s| s.link.take())
            .collect()
    };
    debug!("validation went dormant");
    // Unlink keeps the attachments themselves alive across dormancy.
    for link in links {
        link.cancel_with(CancelReason::Unlink);
    }
}

/// Recompute and broadcast the merged result, outside any internal borrow.
fn broadcast<M: Clone + 'static>(state_rc: &Rc<RefCell<AggregatorState<M>>>) {
    let Some((emitter, merged)) = ({
        let state = state_rc.borrow();
        state
            .live
            .as_ref()
            .map(|live| (live.broadcast.clone(), merged_of(&state)))
    }) else {
        return;
    };
    debug!(messages = merged.len(), "validation result broadcast");
    emitter.send(&merged);
}

/// Concatenation of held non-empty arrays, in attachment order.
fn merged_of<M: Clone>(state: &AggregatorState<M>) -> Vec<M> {
    let mut merged = Vec::new();
    for source in &state.sources {
        if let Some(messages) = &source.held {
            merged.extend(messages.iter().cloned());
        }
    }
    merged
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

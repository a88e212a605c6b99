//! Epics: event-stream middleware
//!
//! An epic receives a view of every event the app processes and of every
//! state it commits, and returns a stream of further events. The app
//! dispatches whatever the returned stream yields, so an epic that matches
//! on `A` and emits `B` turns each `A` into a follow-up `B`.
//!
//! Both input views are fed by the app. Each epic gets its own receivers,
//! sees only items produced after it was attached, and may
//! [`fork`](EventStream::fork) them freely.
//!
//! # Example
//!
//! ```ignore
//! use epicstore_core::epic::{select, EventStream, StateStream};
//! use futures::StreamExt;
//!
//! let ping = EventCreator::new("Ping");
//! let pong = EventCreator::new("Pong");
//!
//! let epic = move |events: EventStream, _states: StateStream| {
//!     let pong = pong.clone();
//!     select(&ping, events).map(move |_| pong.trigger())
//! };
//! ```

use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};

use futures::channel::mpsc::UnboundedReceiver;
use futures::future;
use futures::stream::{self, select_all, BoxStream, Stream, StreamExt};

use crate::effect::panic_message;
use crate::event::{Event, EventType, IntoEventTypes};
use crate::state::AppState;
use crate::subject::Subject;

/// Shared cell holding the last committed state.
pub(crate) type StateCell = Arc<RwLock<AppState>>;

pub(crate) fn read_state(cell: &StateCell) -> AppState {
    cell.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// An event paired with the state committed right after it was processed.
#[derive(Debug, Clone)]
pub struct Selection {
    pub event: Event,
    pub state: AppState,
}

/// The app side of the epic inputs.
pub(crate) struct EpicSources {
    events: Subject<Selection>,
    states: Subject<AppState>,
    state: StateCell,
}

impl EpicSources {
    pub(crate) fn new(state: StateCell) -> Arc<Self> {
        Arc::new(Self {
            events: Subject::new(),
            states: Subject::new(),
            state,
        })
    }

    /// Fresh input views for one epic.
    pub(crate) fn streams(self: &Arc<Self>) -> (EventStream, StateStream) {
        (
            EventStream {
                rx: self.events.subscribe(),
                sources: Arc::clone(self),
            },
            StateStream {
                rx: self.states.subscribe(),
                sources: Arc::clone(self),
            },
        )
    }

    pub(crate) fn push_event(&self, event: &Event, state: &AppState) {
        self.events.next(&Selection {
            event: event.clone(),
            state: state.clone(),
        });
    }

    pub(crate) fn push_state(&self, state: &AppState) {
        self.states.next(state);
    }

    pub(crate) fn complete(&self) {
        self.events.complete();
        self.states.complete();
    }
}

/// Every event the app processes, in processing order.
///
/// Ends when the app stops.
pub struct EventStream {
    rx: UnboundedReceiver<Selection>,
    sources: Arc<EpicSources>,
}

impl EventStream {
    /// An independent view that sees events processed from now on.
    pub fn fork(&self) -> EventStream {
        EventStream {
            rx: self.sources.events.subscribe(),
            sources: Arc::clone(&self.sources),
        }
    }

    /// The last committed state.
    pub fn current_state(&self) -> AppState {
        read_state(&self.sources.state)
    }

    /// Pair each event with the state committed after it.
    pub fn with_state(self) -> impl Stream<Item = Selection> + Send + Unpin + 'static {
        self.rx
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.rx
            .poll_next_unpin(cx)
            .map(|item| item.map(|selection| selection.event))
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}

/// Every committed state whose reference differs from the previous one.
///
/// Ends when the app stops.
pub struct StateStream {
    rx: UnboundedReceiver<AppState>,
    sources: Arc<EpicSources>,
}

impl StateStream {
    /// An independent view that sees states committed from now on.
    pub fn fork(&self) -> StateStream {
        StateStream {
            rx: self.sources.states.subscribe(),
            sources: Arc::clone(&self.sources),
        }
    }

    /// The last committed state.
    pub fn current_state(&self) -> AppState {
        read_state(&self.sources.state)
    }
}

impl Stream for StateStream {
    type Item = AppState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<AppState>> {
        self.rx.poll_next_unpin(cx)
    }
}

impl fmt::Debug for StateStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStream").finish_non_exhaustive()
    }
}

/// Keep only events of the given types, paired with their state.
///
/// The targets are read once, up front, so borrowed creators need not
/// outlive the returned stream.
pub fn select(targets: impl IntoEventTypes, events: EventStream) -> BoxStream<'static, Selection> {
    let types: Vec<EventType> = targets.into_event_types();
    events
        .with_state()
        .filter(move |selection| future::ready(types.contains(selection.event.event_type())))
        .boxed()
}

/// Alias of [`select`] for call sites that pass a list.
pub fn select_array(
    targets: impl IntoEventTypes,
    events: EventStream,
) -> BoxStream<'static, Selection> {
    select(targets, events)
}

/// Event-stream middleware.
///
/// Implemented for every `Fn(EventStream, StateStream) -> impl Stream<Item = Event>`.
pub trait Epic: Send + Sync + 'static {
    fn run(&self, events: EventStream, states: StateStream) -> BoxStream<'static, Event>;
}

impl<F, St> Epic for F
where
    F: Fn(EventStream, StateStream) -> St + Send + Sync + 'static,
    St: Stream<Item = Event> + Send + 'static,
{
    fn run(&self, events: EventStream, states: StateStream) -> BoxStream<'static, Event> {
        self(events, states).boxed()
    }
}

/// Shared, type-erased epic.
pub type BoxEpic = Arc<dyn Epic>;

/// Several epics run as one.
///
/// The output is the union of every member's output, interleaved in
/// arrival order. A panic in any member ends the combined stream.
pub struct CombinedEpic {
    epics: Vec<BoxEpic>,
}

impl Epic for CombinedEpic {
    fn run(&self, events: EventStream, states: StateStream) -> BoxStream<'static, Event> {
        let outputs: Vec<_> = self
            .epics
            .iter()
            .map(|epic| epic.run(events.fork(), states.fork()))
            .collect();
        select_all(outputs).boxed()
    }
}

impl fmt::Debug for CombinedEpic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombinedEpic")
            .field("epics", &self.epics.len())
            .finish()
    }
}

/// Merge epics into one.
pub fn combine_epics(epics: impl IntoIterator<Item = BoxEpic>) -> CombinedEpic {
    CombinedEpic {
        epics: epics.into_iter().collect(),
    }
}

/// A panic caught while running an epic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EpicFailure {
    pub(crate) epic: String,
    pub(crate) message: String,
}

/// One pipeline member: an epic output or an effect run.
pub(crate) type PipelineStream = BoxStream<'static, Result<Event, EpicFailure>>;

/// Start `epic` and wrap its output so a panic ends it with an [`EpicFailure`].
pub(crate) fn guard(
    name: String,
    epic: &dyn Epic,
    events: EventStream,
    states: StateStream,
    stop: impl Future<Output = ()> + Send + 'static,
) -> PipelineStream {
    let output = match catch_unwind(AssertUnwindSafe(|| epic.run(events, states))) {
        Ok(output) => output,
        Err(panic) => {
            let failure = EpicFailure {
                epic: name,
                message: panic_message(&*panic),
            };
            return stream::once(future::ready(Err(failure))).boxed();
        }
    };

    AssertUnwindSafe(output.take_until(stop))
        .catch_unwind()
        .map(move |item| {
            item.map_err(|panic| EpicFailure {
                epic: name.clone(),
                message: panic_message(&*panic),
            })
        })
        .boxed()
}

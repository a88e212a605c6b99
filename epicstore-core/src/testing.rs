//! Test utilities for epicstore apps
//!
//! - [`TestHarness`]: builds an app and records every event it processes
//! - Assertion macros matching recorded events against creators
//! - Time control for async epics and effects (feature `testing-time`)
//!
//! # Example
//!
//! ```ignore
//! use epicstore_core::testing::TestHarness;
//! use epicstore_core::{assert_emitted, assert_not_emitted};
//!
//! let mut harness = TestHarness::new([checkout_module()])?;
//! harness.app().api().trigger("submit")?;
//!
//! let events = harness.drain_emitted();
//! assert_emitted!(events, pay.start);
//! assert_not_emitted!(events, pay.fail);
//! ```

use tokio::sync::mpsc;

use crate::app::{App, AppBuilder};
use crate::event::Event;
use crate::middleware::Middleware;
use crate::module::Module;
use crate::state::AppState;

/// Middleware that forwards every processed event into a channel.
#[derive(Debug, Clone)]
pub struct RecordingMiddleware {
    tx: mpsc::UnboundedSender<Event>,
}

impl RecordingMiddleware {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }
}

impl Middleware for RecordingMiddleware {
    fn before(&mut self, event: &Event) {
        let _ = self.tx.send(event.clone());
    }

    fn after(&mut self, _event: &Event, _state_changed: bool) {}
}

/// An app under test plus the record of what it processed.
pub struct TestHarness {
    app: App,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl TestHarness {
    /// Build an app named `test` from `modules`.
    pub fn new(modules: impl IntoIterator<Item = Module>) -> crate::Result<Self> {
        Self::with_builder(App::builder("test").modules(modules))
    }

    /// Build from a prepared builder (custom config or middleware).
    pub fn with_builder(builder: AppBuilder) -> crate::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = builder.middleware(RecordingMiddleware::new(tx)).build()?;
        Ok(Self { app, rx })
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn state(&self) -> AppState {
        self.app.state()
    }

    pub fn dispatch(&self, event: Event) -> crate::Result<()> {
        self.app.dispatch(event)
    }

    /// Drain all events processed since the last drain.
    pub fn drain_emitted(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Check if any events were processed since the last drain.
    pub fn has_emitted(&mut self) -> bool {
        !self.drain_emitted().is_empty()
    }
}

/// Assert that an event matching a creator was emitted.
///
/// Accepts anything with an `is(&Event) -> bool` method: event creators
/// and effect creators (matching their `start` event). An optional third
/// argument filters further.
///
/// # Example
///
/// ```ignore
/// let events = harness.drain_emitted();
/// assert_emitted!(events, add_item);
/// assert_emitted!(events, pay.success, |e| e.payload()["total"] == 30);
/// ```
#[macro_export]
macro_rules! assert_emitted {
    ($events:expr, $creator:expr) => {
        assert!(
            $events.iter().any(|e| $creator.is(e)),
            "Expected event matching `{}` to be emitted, but got: {:?}",
            stringify!($creator),
            $events
        );
    };
    ($events:expr, $creator:expr, $filter:expr) => {
        assert!(
            $events.iter().any(|e| $creator.is(e) && ($filter)(e)),
            "Expected event matching `{}` to be emitted, but got: {:?}",
            stringify!($creator),
            $events
        );
    };
}

/// Assert that no event matching a creator was emitted.
#[macro_export]
macro_rules! assert_not_emitted {
    ($events:expr, $creator:expr) => {
        assert!(
            !$events.iter().any(|e| $creator.is(e)),
            "Expected event matching `{}` NOT to be emitted, but it was: {:?}",
            stringify!($creator),
            $events
        );
    };
}

/// Find the first event matching a creator.
#[macro_export]
macro_rules! find_emitted {
    ($events:expr, $creator:expr) => {
        $events.iter().find(|e| $creator.is(e))
    };
}

/// Count the events matching a creator.
#[macro_export]
macro_rules! count_emitted {
    ($events:expr, $creator:expr) => {
        $events.iter().filter(|e| $creator.is(e)).count()
    };
}

/// Freeze the tokio clock of the current runtime.
///
/// Must be called from a current-thread runtime.
#[cfg(feature = "testing-time")]
pub fn pause_time() {
    tokio::time::pause();
}

/// Resume a paused tokio clock.
#[cfg(feature = "testing-time")]
pub fn resume_time() {
    tokio::time::resume();
}

/// Move a paused clock forward, firing every timer that falls due.
#[cfg(feature = "testing-time")]
pub async fn advance_time(duration: std::time::Duration) {
    tokio::time::advance(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epic::{select, EventStream, StateStream};
    use crate::event::EventCreator;
    use crate::reducer::Reducer;
    use futures::StreamExt;
    use serde_json::{json, Value};

    fn module(ping: &EventCreator, pong: &EventCreator) -> Module {
        let (ping2, pong2) = (ping.clone(), pong.clone());
        Module::new("pingpong")
            .reducer(
                "pongs",
                Reducer::new(0u32).on(pong, |n: &u32, _, _| n + 1),
            )
            .epic(move |events: EventStream, _: StateStream| {
                let pong2 = pong2.clone();
                select(&ping2, events).map(move |s| pong2.call(s.event.payload().clone()))
            })
    }

    #[test]
    fn test_harness_records_dispatched_and_epic_events() {
        let ping = EventCreator::new("Ping");
        let pong = EventCreator::new("Pong");
        let other = EventCreator::new("Other");
        let mut harness = TestHarness::new([module(&ping, &pong)]).unwrap();

        harness.dispatch(ping.call(7)).unwrap();
        harness.dispatch(ping.call(8)).unwrap();

        let events = harness.drain_emitted();
        assert_eq!(events.len(), 4);
        assert_emitted!(events, ping);
        assert_emitted!(events, pong, |e: &Event| e.payload() == &json!(8));
        assert_not_emitted!(events, other);
        assert_eq!(count_emitted!(events, pong), 2);
        assert_eq!(
            find_emitted!(events, pong).map(|e| e.payload().clone()),
            Some(json!(7))
        );

        assert_eq!(harness.state().get::<u32>("pongs"), Some(&2));
        assert!(!harness.has_emitted());
    }

    #[test]
    fn test_macros_accept_effects() {
        let effect = crate::effect::EffectCreator::new("Load").use_sync(|_| Ok::<_, String>(1));
        let mut harness =
            TestHarness::new([Module::new("loader").effect("load", effect.clone())]).unwrap();

        harness.app().api().call("load", Value::Null).unwrap();
        let events = harness.drain_emitted();
        assert_emitted!(events, effect);
        assert_emitted!(events, effect.success);
        assert_eq!(count_emitted!(events, effect.fail), 0);
    }
}

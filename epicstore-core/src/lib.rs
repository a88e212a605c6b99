//! Core types for epicstore
//!
//! This crate provides the store engine: a central state container driven by
//! typed events, pure reducers and epics (event-stream middleware).
//!
//! # Core Concepts
//!
//! - **Event**: Immutable `{ type, payload, meta }` record describing something that happened
//! - **Reducer**: Maps events to state transitions; handlers attach and detach at runtime
//! - **Effect**: An async or sync function wrapped as a start / success-or-fail / complete sequence
//! - **Epic**: Turns the stream of processed events into further events
//! - **Module**: A named bundle of reducers, api entries and epics
//! - **App**: Merges modules, dispatches events and notifies subscribers
//!
//! # Basic Example
//!
//! ```
//! use epicstore_core::prelude::*;
//! use futures::StreamExt;
//!
//! #[derive(Clone, Default)]
//! struct Cart { items: u32 }
//!
//! let add = EventCreator::new("Add item");
//! let added = EventCreator::new("Item added");
//!
//! let cart = Reducer::new(Cart::default())
//!     .on(&added, |cart: &Cart, _, _| Cart { items: cart.items + 1 });
//!
//! // Every `add` is acknowledged with an `added`.
//! let (add2, added2) = (add.clone(), added.clone());
//! let acknowledge = move |events: EventStream, _states: StateStream| {
//!     let added2 = added2.clone();
//!     select(&add2, events).map(move |_| added2.trigger())
//! };
//!
//! let app = create_app("shop", [Module::new("cart")
//!     .reducer("cart", cart)
//!     .event("add", add)
//!     .epic(acknowledge)]).unwrap();
//!
//! app.api().trigger("add").unwrap();
//! assert_eq!(app.state().get::<Cart>("cart").unwrap().items, 1);
//! ```
//!
//! # Async Work
//!
//! Effects run inside the app's pipeline. Their events are dispatched as the
//! underlying future makes progress, so async results need a tokio runtime
//! driving timers and IO; synchronous effects complete within the dispatch.

pub mod app;
pub mod builtin;
pub mod config;
pub mod effect;
pub mod epic;
pub mod error;
pub mod event;
pub mod event_log;
pub mod middleware;
pub mod module;
pub mod reducer;
pub mod state;
mod subject;
pub mod testing;

// Error exports
pub use error::{Result, StoreError};

// Event exports
pub use event::{create_event, unique_id, Event, EventCreator, EventType, IntoEventTypes};

// State and reducer exports
pub use reducer::{create_reducer, EventCreators, Handlers, Reducer, ReducerTree};
pub use state::{AppState, Slice};

// Effect exports
pub use effect::{create_effect, EffectCreator, EffectRun};

// Epic exports
pub use epic::{
    combine_epics, select, select_array, BoxEpic, CombinedEpic, Epic, EventStream, Selection,
    StateStream,
};

// App exports
pub use app::{create_app, Api, App, AppBuilder, AppStatus, BoundEvent, EpicHandle, Subscription};
pub use builtin::{dangerously_replace_state, dangerously_reset_state, epic_end};
pub use config::{AppConfig, EpicFailurePolicy};
pub use event_log::{EventFilter, EventLog, EventLogConfig, EventLogEntry};
pub use middleware::{ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware};
pub use module::{ApiEntry, Module};

// Testing exports
pub use testing::{RecordingMiddleware, TestHarness};

#[cfg(feature = "testing-time")]
pub use testing::{advance_time, pause_time, resume_time};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::app::{create_app, Api, App, AppStatus, Subscription};
    pub use crate::config::{AppConfig, EpicFailurePolicy};
    pub use crate::effect::{create_effect, EffectCreator};
    pub use crate::epic::{combine_epics, select, select_array, Epic, EventStream, StateStream};
    pub use crate::error::StoreError;
    pub use crate::event::{create_event, Event, EventCreator, EventType};
    pub use crate::middleware::{LoggingMiddleware, Middleware};
    pub use crate::module::Module;
    pub use crate::reducer::{create_reducer, Handlers, Reducer, ReducerTree};
    pub use crate::state::AppState;
}

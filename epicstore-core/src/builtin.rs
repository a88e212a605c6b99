//! Built-in events understood by every app
//!
//! Built-ins carry fixed types, so they match across processes and replays.
//! They bypass the reducers.

use crate::event::{Event, EventCreator, EventType};

pub const EPIC_END: &str = "@epicstore/EPIC_END";
pub const REPLACE_STATE: &str = "@epicstore/DANGEROUSLY_REPLACE_STATE";
pub const RESET_STATE: &str = "@epicstore/DANGEROUSLY_RESET_STATE";

/// Teardown event.
///
/// Processing it completes the epic input streams, closes every
/// subscription and stops the app. Later dispatches fail with
/// [`StoreError::AppStopped`](crate::StoreError::AppStopped).
pub fn epic_end() -> EventCreator {
    EventCreator::with_type("Epic end".to_string(), EventType::from(EPIC_END))
}

/// Replace the whole state without running reducers.
///
/// Debug only. The replacement is supplied through
/// [`App::dangerously_replace_state`](crate::App::dangerously_replace_state);
/// dispatching this event directly does nothing but log a warning.
pub fn dangerously_replace_state() -> EventCreator {
    EventCreator::with_type(
        "Dangerously replace state".to_string(),
        EventType::from(REPLACE_STATE),
    )
}

/// Restore the initial state of every reducer without running them.
///
/// Debug only.
pub fn dangerously_reset_state() -> EventCreator {
    EventCreator::with_type(
        "Dangerously reset state".to_string(),
        EventType::from(RESET_STATE),
    )
}

pub(crate) fn is_epic_end(event: &Event) -> bool {
    event.event_type() == EPIC_END
}

pub(crate) fn is_replace_state(event: &Event) -> bool {
    event.event_type() == REPLACE_STATE
}

pub(crate) fn is_reset_state(event: &Event) -> bool {
    event.event_type() == RESET_STATE
}

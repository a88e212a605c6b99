//! Dispatch middleware
//!
//! Middleware observes every event the app processes: `before` runs ahead of
//! the reducers, `after` once the new state is committed.

use crate::event::Event;

/// Middleware trait for intercepting dispatched events
///
/// Implement this trait to add logging, recording, or other cross-cutting
/// concerns to an app.
pub trait Middleware: Send {
    /// Called before the event reaches the reducers
    fn before(&mut self, event: &Event);

    /// Called after the reducers ran and the state was committed
    fn after(&mut self, event: &Event, state_changed: bool);
}

/// A no-op middleware that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMiddleware;

impl Middleware for NoopMiddleware {
    fn before(&mut self, _event: &Event) {}
    fn after(&mut self, _event: &Event, _state_changed: bool) {}
}

/// Middleware that logs events through `tracing`
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    /// Whether to log before dispatch
    pub log_before: bool,
    /// Whether to log after dispatch
    pub log_after: bool,
}

impl LoggingMiddleware {
    /// Create a new logging middleware with default settings (log after only)
    pub fn new() -> Self {
        Self {
            log_before: false,
            log_after: true,
        }
    }

    /// Create a logging middleware that logs both before and after
    pub fn verbose() -> Self {
        Self {
            log_before: true,
            log_after: true,
        }
    }
}

impl Middleware for LoggingMiddleware {
    fn before(&mut self, event: &Event) {
        if self.log_before {
            tracing::debug!(event = %event.event_type(), "Dispatching event");
        }
    }

    fn after(&mut self, event: &Event, state_changed: bool) {
        if self.log_after {
            tracing::debug!(
                event = %event.event_type(),
                state_changed = state_changed,
                "Event processed"
            );
        }
    }
}

/// Compose multiple middleware into a single middleware
#[derive(Default)]
pub struct ComposedMiddleware {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl std::fmt::Debug for ComposedMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedMiddleware")
            .field("middlewares_count", &self.middlewares.len())
            .finish()
    }
}

impl ComposedMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the composition
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
    }

    pub(crate) fn add_boxed(&mut self, middleware: Box<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl Middleware for ComposedMiddleware {
    fn before(&mut self, event: &Event) {
        for middleware in &mut self.middlewares {
            middleware.before(event);
        }
    }

    fn after(&mut self, event: &Event, state_changed: bool) {
        // Reverse order so hooks nest
        for middleware in self.middlewares.iter_mut().rev() {
            middleware.after(event, state_changed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recording {
        label: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Recording {
        fn before(&mut self, _event: &Event) {
            self.calls.lock().unwrap().push(format!("before:{}", self.label));
        }

        fn after(&mut self, _event: &Event, state_changed: bool) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("after:{}:{}", self.label, state_changed));
        }
    }

    #[test]
    fn test_composed_runs_after_in_reverse() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut composed = ComposedMiddleware::new();
        composed.add(Recording {
            label: "outer",
            calls: calls.clone(),
        });
        composed.add(Recording {
            label: "inner",
            calls: calls.clone(),
        });
        assert_eq!(composed.len(), 2);

        let event = Event::trigger("ping");
        composed.before(&event);
        composed.after(&event, true);

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "before:outer",
                "before:inner",
                "after:inner:true",
                "after:outer:true"
            ]
        );
    }

    #[test]
    fn test_noop_and_logging_accept_events() {
        let event = Event::trigger("ping");
        NoopMiddleware.before(&event);
        NoopMiddleware.after(&event, false);

        let mut logging = LoggingMiddleware::verbose();
        logging.before(&event);
        logging.after(&event, true);
        assert!(LoggingMiddleware::new().log_after);
    }
}

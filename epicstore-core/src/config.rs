//! App configuration

use serde::Deserialize;

use crate::event_log::EventLogConfig;

/// What happens when an epic panics while the pipeline polls it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpicFailurePolicy {
    /// Log the failure and end that epic; sibling epics keep running.
    #[default]
    Isolate,
    /// Drop every epic and fail the dispatch that was draining.
    Propagate,
}

/// Configuration for an [`App`](crate::App)
///
/// Deserializable so it can live in a settings file:
///
/// ```
/// use epicstore_core::config::{AppConfig, EpicFailurePolicy};
///
/// let config: AppConfig = serde_json::from_str(
///     r#"{ "epic_failure": "propagate", "event_log": { "capacity": 256 } }"#,
/// ).unwrap();
///
/// assert_eq!(config.epic_failure, EpicFailurePolicy::Propagate);
/// assert_eq!(config.event_log.capacity, Some(256));
/// assert!(!config.log_dispatch);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Event log capacity and filter
    pub event_log: EventLogConfig,
    pub epic_failure: EpicFailurePolicy,
    /// Install a [`LoggingMiddleware`](crate::middleware::LoggingMiddleware)
    pub log_dispatch: bool,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_log(mut self, event_log: EventLogConfig) -> Self {
        self.event_log = event_log;
        self
    }

    pub fn epic_failure(mut self, policy: EpicFailurePolicy) -> Self {
        self.epic_failure = policy;
        self
    }

    pub fn log_dispatch(mut self, enabled: bool) -> Self {
        self.log_dispatch = enabled;
        self
    }
}

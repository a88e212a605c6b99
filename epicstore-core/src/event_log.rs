//! In-memory event log with pattern-based filtering
//!
//! Every event the app processes is recorded (subject to [`EventFilter`])
//! together with a sequence number, a timestamp and whether it changed the
//! state. A recorded log can be replayed into a fresh app.
//!
//! # Example
//!
//! ```
//! use epicstore_core::event::Event;
//! use epicstore_core::event_log::{EventFilter, EventLog, EventLogConfig};
//!
//! let mut log = EventLog::new(EventLogConfig {
//!     capacity: Some(2),
//!     filter: EventFilter::new(None, Some("tick*")),
//! });
//!
//! log.record(&Event::trigger("tick [1]"));
//! log.record(&Event::trigger("load [2]"));
//! log.update_last_state_changed(true);
//!
//! assert_eq!(log.len(), 1);
//! assert_eq!(log.entries().next().unwrap().state_changed, Some(true));
//! ```

use std::collections::VecDeque;
use std::time::Instant;

use serde::Deserialize;

use crate::event::Event;

/// Include/exclude filter over event type strings.
///
/// Patterns support:
/// - `*` matches any sequence of characters
/// - `?` matches any single character
/// - Literal text matches exactly
///
/// Event types end in a unique ` [n]` suffix, so match creator events with
/// a trailing `*`, e.g. `Checkout*`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventFilter {
    /// If non-empty, only record events matching these patterns
    pub include: Vec<String>,
    /// Skip events matching these patterns (applied after include)
    pub exclude: Vec<String>,
}

impl EventFilter {
    /// Create a filter from comma-separated pattern strings
    ///
    /// # Example
    /// ```
    /// use epicstore_core::event_log::EventFilter;
    ///
    /// let filter = EventFilter::new(Some("Cart*,Pay*"), Some("*: START*"));
    /// assert!(filter.should_log("Cart add [3]"));
    /// assert!(!filter.should_log("Pay: START [4]"));
    /// assert!(!filter.should_log("Tick [5]"));
    /// ```
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include: include.map(split_patterns).unwrap_or_default(),
            exclude: exclude.map(split_patterns).unwrap_or_default(),
        }
    }

    /// Check if an event type should be recorded
    pub fn should_log(&self, event_type: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|p| glob_match(p, event_type)) {
            return false;
        }
        !self.exclude.iter().any(|p| glob_match(p, event_type))
    }
}

fn split_patterns(list: &str) -> Vec<String> {
    list.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Configuration for the event log
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventLogConfig {
    /// Maximum number of entries to keep; `None` keeps everything
    pub capacity: Option<usize>,
    pub filter: EventFilter,
}

impl EventLogConfig {
    /// Create with a bounded capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Default::default()
        }
    }
}

/// An entry in the event log
#[derive(Debug, Clone)]
pub struct EventLogEntry {
    pub event: Event,
    /// Sequence number for ordering
    pub sequence: u64,
    /// When the event was recorded
    pub timestamp: Instant,
    /// Whether the event changed the state (set after the reducers run)
    pub state_changed: Option<bool>,
}

impl EventLogEntry {
    fn new(event: Event, sequence: u64) -> Self {
        Self {
            event,
            sequence,
            timestamp: Instant::now(),
            state_changed: None,
        }
    }

    /// Time since this event was recorded
    pub fn elapsed(&self) -> std::time::Duration {
        self.timestamp.elapsed()
    }
}

/// Ordered log of processed events
///
/// Bounded logs discard the oldest entries once capacity is reached.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: VecDeque<EventLogEntry>,
    config: EventLogConfig,
    next_sequence: u64,
    last_recorded: bool,
}

impl EventLog {
    pub fn new(config: EventLogConfig) -> Self {
        Self {
            entries: VecDeque::with_capacity(config.capacity.unwrap_or(0)),
            config,
            next_sequence: 0,
            last_recorded: false,
        }
    }

    /// Record an event (if it passes the filter)
    ///
    /// Returns the entry if it was recorded, None if filtered out.
    pub fn record(&mut self, event: &Event) -> Option<&EventLogEntry> {
        self.last_recorded = false;
        if !self.config.filter.should_log(event.event_type().as_str()) {
            return None;
        }

        let entry = EventLogEntry::new(event.clone(), self.next_sequence);
        self.next_sequence += 1;

        if let Some(capacity) = self.config.capacity {
            if capacity == 0 {
                return None;
            }
            if self.entries.len() >= capacity {
                self.entries.pop_front();
            }
        }

        self.entries.push_back(entry);
        self.last_recorded = true;
        self.entries.back()
    }

    /// Update the last entry with state_changed info (called after the reducers)
    ///
    /// No-op when the most recent event was filtered out.
    pub fn update_last_state_changed(&mut self, changed: bool) {
        if !self.last_recorded {
            return;
        }
        if let Some(entry) = self.entries.back_mut() {
            entry.state_changed = Some(changed);
        }
    }

    /// Get all entries (oldest first)
    pub fn entries(&self) -> impl Iterator<Item = &EventLogEntry> {
        self.entries.iter()
    }

    /// Get the most recent N entries (newest first)
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &EventLogEntry> {
        self.entries.iter().rev().take(count)
    }

    /// The recorded events in order, ready for replay
    pub fn events(&self) -> Vec<Event> {
        self.entries.iter().map(|entry| entry.event.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_recorded = false;
    }

    pub fn config(&self) -> &EventLogConfig {
        &self.config
    }
}

/// Simple glob pattern matching supporting `*` and `?`.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut pi = 0;
    let mut ti = 0;
    let mut star: Option<(usize, usize)> = None;

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = star {
            // Let the last star swallow one more character
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }

    pattern[pi..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("Tick", "Tick"));
        assert!(!glob_match("Tick", "TickTock"));
        assert!(glob_match("Cart*", "Cart add [1]"));
        assert!(!glob_match("Cart*", "Open cart [1]"));
        assert!(glob_match("*: FAIL*", "Pay: FAIL [9]"));
        assert!(glob_match("Tick?", "Ticks"));
        assert!(!glob_match("Tick?", "Tick"));
        assert!(glob_match("a*b*c", "axxbyyc"));
    }

    #[test]
    fn test_filter_include_and_exclude() {
        let filter = EventFilter::new(Some("Did*"), Some("DidFail*"));
        assert!(filter.should_log("DidConnect [1]"));
        assert!(!filter.should_log("DidFailConnect [2]"));
        assert!(!filter.should_log("Search [3]"));
    }

    #[test]
    fn test_default_filter_records_everything() {
        let filter = EventFilter::default();
        assert!(filter.should_log("anything"));
        assert_eq!(EventFilter::new(None, Some(" , ")), filter);
    }

    #[test]
    fn test_unbounded_by_default() {
        let mut log = EventLog::default();
        for i in 0..500 {
            log.record(&Event::trigger(format!("e{}", i)));
        }
        assert_eq!(log.len(), 500);
        assert_eq!(log.entries().next().unwrap().sequence, 0);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut log = EventLog::new(EventLogConfig::with_capacity(3));
        for i in 0..4 {
            log.record(&Event::trigger(format!("e{}", i)));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.entries().next().unwrap().sequence, 1);

        let recent: Vec<_> = log.recent(2).map(|e| e.sequence).collect();
        assert_eq!(recent, vec![3, 2]);
    }

    #[test]
    fn test_filtered_event_does_not_update_previous_entry() {
        let mut log = EventLog::new(EventLogConfig {
            capacity: None,
            filter: EventFilter::new(None, Some("tick")),
        });

        log.record(&Event::trigger("load"));
        log.update_last_state_changed(true);
        log.record(&Event::trigger("tick"));
        log.update_last_state_changed(false);

        assert_eq!(log.len(), 1);
        assert_eq!(log.entries().next().unwrap().state_changed, Some(true));
    }

    #[test]
    fn test_events_for_replay() {
        let mut log = EventLog::default();
        log.record(&Event::trigger("a"));
        log.record(&Event::trigger("b"));
        let types: Vec<_> = log
            .events()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect();
        assert_eq!(types, vec!["a", "b"]);
    }

    #[test]
    fn test_config_deserializes() {
        let config: EventLogConfig = serde_json::from_str(
            r#"{ "capacity": 10, "filter": { "exclude": ["Tick*"] } }"#,
        )
        .unwrap();
        assert_eq!(config.capacity, Some(10));
        assert!(!config.filter.should_log("Tick [1]"));
    }
}

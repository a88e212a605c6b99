//! Events and event creators
//!
//! An [`Event`] is an immutable `{ type, payload, meta }` record. Events are
//! produced by [`EventCreator`]s, which assign every creator a process-unique
//! type tag so two creators never collide, even when they share a description.
//!
//! # Example
//!
//! ```
//! use epicstore_core::event::EventCreator;
//! use serde_json::json;
//!
//! let add_item = EventCreator::new("Add item");
//! let event = add_item.call(json!({ "sku": "A-1" }));
//!
//! assert!(add_item.is(&event));
//! assert_eq!(event.payload()["sku"], "A-1");
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a process-unique identifier.
///
/// Used for event type suffixes and per-call effect completion markers.
pub fn unique_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// The type tag of an event.
///
/// Cheap to clone. Matching between events, creators and reducers always
/// compares type tags, never object identity.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventType(Arc<str>);

impl EventType {
    /// Create a type tag from a raw string.
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(Arc::from(tag.as_ref()))
    }

    /// Get the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for EventType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

impl Borrow<str> for EventType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EventType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&String> for EventType {
    fn from(s: &String) -> Self {
        Self::new(s)
    }
}

impl From<&EventType> for EventType {
    fn from(t: &EventType) -> Self {
        t.clone()
    }
}

impl From<&EventCreator> for EventType {
    fn from(creator: &EventCreator) -> Self {
        creator.inner.event_type.clone()
    }
}

impl From<&Event> for EventType {
    fn from(event: &Event) -> Self {
        event.event_type.clone()
    }
}

impl PartialEq<str> for EventType {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for EventType {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

/// A dispatched event.
///
/// Immutable once constructed. Events with a `Null` payload and meta act as
/// plain triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    event_type: EventType,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    meta: Value,
}

impl Event {
    /// Create an event from its parts.
    pub fn new(event_type: impl Into<EventType>, payload: Value, meta: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            meta,
        }
    }

    /// Create a payload-less, meta-less event.
    pub fn trigger(event_type: impl Into<EventType>) -> Self {
        Self::new(event_type, Value::Null, Value::Null)
    }

    /// The event type tag.
    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn meta(&self) -> &Value {
        &self.meta
    }

    /// Deserialize the payload into a concrete type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// Whether this event carries the given type tag.
    pub fn is(&self, event_type: impl Into<EventType>) -> bool {
        self.event_type == event_type.into()
    }
}

/// Maps the raw creator argument to a payload or meta value.
pub type Mapper = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

struct CreatorInner {
    description: String,
    event_type: EventType,
    payload_mapper: Option<Mapper>,
    meta_mapper: Option<Mapper>,
}

/// Factory for events of one type.
///
/// Cloning yields a handle to the same creator.
#[derive(Clone)]
pub struct EventCreator {
    inner: Arc<CreatorInner>,
}

impl EventCreator {
    /// Create a creator whose type is `description` plus a unique suffix.
    pub fn new(description: impl Into<String>) -> Self {
        let description = description.into();
        let event_type = EventType::from(format!("{} [{}]", description, unique_id()));
        Self::with_type(description, event_type)
    }

    /// Create a creator with no description; its events act as triggers.
    pub fn anonymous() -> Self {
        let event_type = EventType::from(unique_id().to_string());
        Self::with_type(String::new(), event_type)
    }

    /// Create a creator with a fixed, caller-chosen type.
    ///
    /// Used for built-in events whose type must be stable across processes.
    pub(crate) fn with_type(description: String, event_type: EventType) -> Self {
        Self {
            inner: Arc::new(CreatorInner {
                description,
                event_type,
                payload_mapper: None,
                meta_mapper: None,
            }),
        }
    }

    /// Set the payload mapper. Defaults to identity.
    pub fn with_payload<F>(self, mapper: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.rebuild(Some(Arc::new(mapper)), None)
    }

    /// Set the meta mapper. Defaults to `Null`.
    pub fn with_meta<F>(self, mapper: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.rebuild(None, Some(Arc::new(mapper)))
    }

    fn rebuild(self, payload: Option<Mapper>, meta: Option<Mapper>) -> Self {
        let inner = &self.inner;
        Self {
            inner: Arc::new(CreatorInner {
                description: inner.description.clone(),
                event_type: inner.event_type.clone(),
                payload_mapper: payload.or_else(|| inner.payload_mapper.clone()),
                meta_mapper: meta.or_else(|| inner.meta_mapper.clone()),
            }),
        }
    }

    /// Build an event from a raw argument, applying both mappers.
    pub fn call(&self, raw: impl Into<Value>) -> Event {
        let raw = raw.into();
        let meta = match &self.inner.meta_mapper {
            Some(mapper) => mapper(&raw),
            None => Value::Null,
        };
        let payload = match &self.inner.payload_mapper {
            Some(mapper) => mapper(&raw),
            None => raw,
        };
        Event::new(self.inner.event_type.clone(), payload, meta)
    }

    /// Build an event with no argument.
    pub fn trigger(&self) -> Event {
        self.call(Value::Null)
    }

    /// Serialize `payload` and build an event from it.
    pub fn call_with<T: Serialize>(&self, payload: &T) -> crate::Result<Event> {
        Ok(self.call(serde_json::to_value(payload)?))
    }

    pub fn get_type(&self) -> &EventType {
        &self.inner.event_type
    }

    pub fn description(&self) -> &str {
        &self.inner.description
    }

    /// Whether `event` was produced by a creator of this type.
    pub fn is(&self, event: &Event) -> bool {
        event.event_type == self.inner.event_type
    }
}

impl fmt::Debug for EventCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCreator")
            .field("type", &self.inner.event_type)
            .finish()
    }
}

impl PartialEq<str> for EventCreator {
    fn eq(&self, other: &str) -> bool {
        self.inner.event_type == *other
    }
}

impl PartialEq<&str> for EventCreator {
    fn eq(&self, other: &&str) -> bool {
        self.inner.event_type == **other
    }
}

/// Shorthand for [`EventCreator::new`].
pub fn create_event(description: impl Into<String>) -> EventCreator {
    EventCreator::new(description)
}

/// Normalizes one or many event targets into type tags.
///
/// Implemented for single creators, raw strings, and collections of either.
/// To mix creators and raw strings, collect them as `Vec<EventType>`:
///
/// ```
/// use epicstore_core::event::{EventCreator, EventType, IntoEventTypes};
///
/// let opened = EventCreator::new("Opened");
/// let types = vec![EventType::from(&opened), EventType::from("external/closed")]
///     .into_event_types();
/// assert_eq!(types.len(), 2);
/// ```
pub trait IntoEventTypes {
    fn into_event_types(self) -> Vec<EventType>;
}

macro_rules! single_target {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoEventTypes for $ty {
                fn into_event_types(self) -> Vec<EventType> {
                    vec![EventType::from(self)]
                }
            }
        )*
    };
}

single_target!(&str, String, &String, &EventType, &EventCreator, &Event);

impl IntoEventTypes for EventType {
    fn into_event_types(self) -> Vec<EventType> {
        vec![self]
    }
}

impl IntoEventTypes for Vec<EventType> {
    fn into_event_types(self) -> Vec<EventType> {
        self
    }
}

impl IntoEventTypes for &[EventType] {
    fn into_event_types(self) -> Vec<EventType> {
        self.to_vec()
    }
}

impl<const N: usize> IntoEventTypes for [EventType; N] {
    fn into_event_types(self) -> Vec<EventType> {
        self.into()
    }
}

impl IntoEventTypes for &[&EventCreator] {
    fn into_event_types(self) -> Vec<EventType> {
        self.iter().map(|c| EventType::from(*c)).collect()
    }
}

impl IntoEventTypes for Vec<&EventCreator> {
    fn into_event_types(self) -> Vec<EventType> {
        self.into_iter().map(EventType::from).collect()
    }
}

impl<const N: usize> IntoEventTypes for [&EventCreator; N] {
    fn into_event_types(self) -> Vec<EventType> {
        self.into_iter().map(EventType::from).collect()
    }
}

impl IntoEventTypes for &[&str] {
    fn into_event_types(self) -> Vec<EventType> {
        self.iter().map(|s| EventType::from(*s)).collect()
    }
}

impl<const N: usize> IntoEventTypes for [&str; N] {
    fn into_event_types(self) -> Vec<EventType> {
        self.into_iter().map(EventType::from).collect()
    }
}

//! Reducers with a runtime-mutable handler table
//!
//! A [`Reducer<S>`] maps event types to handlers. Handlers are attached and
//! detached at any time; applying the reducer to an event without a handler
//! returns the input state reference unchanged.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use epicstore_core::event::EventCreator;
//! use epicstore_core::reducer::Reducer;
//!
//! #[derive(Clone, Default)]
//! struct Cart { items: u32 }
//!
//! let add = EventCreator::new("Add");
//! let clear = EventCreator::new("Clear");
//!
//! let cart = Reducer::new(Cart::default())
//!     .on(&add, |cart: &Cart, _, _| Cart { items: cart.items + 1 })
//!     .reset(&clear);
//!
//! let state = cart.initial_state();
//! let state = cart.apply(&state, &add.trigger());
//! assert_eq!(state.items, 1);
//!
//! let state = cart.apply(&state, &clear.trigger());
//! assert!(Arc::ptr_eq(&state, &cart.initial_state()));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::ops::Index;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use serde_json::Value;

use crate::event::{Event, EventCreator, EventType, IntoEventTypes};
use crate::state::{AnySlice, AppState, Slice};

/// An event handler: `(state, payload, meta) -> next state`.
pub type Handler<S> = Arc<dyn Fn(&S, &Value, &Value) -> S + Send + Sync>;

enum Entry<S> {
    Update(Handler<S>),
    Reset,
}

impl<S> Clone for Entry<S> {
    fn clone(&self) -> Self {
        match self {
            Entry::Update(handler) => Entry::Update(Arc::clone(handler)),
            Entry::Reset => Entry::Reset,
        }
    }
}

struct ReducerInner<S> {
    initial: Arc<S>,
    handlers: RwLock<HashMap<EventType, Entry<S>>>,
}

/// A reducer on steroids.
///
/// Cloning yields a handle to the same reducer, so handlers attached through
/// any clone are visible to all of them (including the running app).
pub struct Reducer<S> {
    inner: Arc<ReducerInner<S>>,
}

impl<S> Clone for Reducer<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> fmt::Debug for Reducer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("Reducer")
            .field("handlers", &handlers)
            .finish()
    }
}

impl<S: Send + Sync + 'static> Reducer<S> {
    /// Create a reducer with the given initial state.
    pub fn new(initial: S) -> Self {
        Self {
            inner: Arc::new(ReducerInner {
                initial: Arc::new(initial),
                handlers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Attach `handler` to every given event type.
    ///
    /// An existing handler for the same type is replaced.
    pub fn on<F>(&self, targets: impl IntoEventTypes, handler: F) -> Self
    where
        F: Fn(&S, &Value, &Value) -> S + Send + Sync + 'static,
    {
        let handler: Handler<S> = Arc::new(handler);
        self.insert(targets, Entry::Update(handler));
        self.clone()
    }

    /// Detach handlers for every given event type.
    ///
    /// Detaching a type with no handler is a no-op.
    pub fn off(&self, targets: impl IntoEventTypes) -> Self {
        let mut handlers = self.write();
        for event_type in targets.into_event_types() {
            handlers.remove(&event_type);
        }
        drop(handlers);
        self.clone()
    }

    /// Make every given event type restore the initial state.
    pub fn reset(&self, targets: impl IntoEventTypes) -> Self {
        self.insert(targets, Entry::Reset);
        self.clone()
    }

    /// Whether a handler is attached for the event type.
    pub fn has(&self, target: impl Into<EventType>) -> bool {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&target.into())
    }

    /// Synthesize one event creator per handler and attach the handlers.
    ///
    /// Each creator is described by its handler name.
    pub fn create_events(&self, handlers: Handlers<S>) -> EventCreators {
        let mut creators = IndexMap::with_capacity(handlers.entries.len());
        for (name, handler) in handlers.entries {
            let creator = EventCreator::new(name.clone());
            self.insert(&creator, Entry::Update(handler));
            creators.insert(name, creator);
        }
        EventCreators { creators }
    }

    /// The captured initial state.
    pub fn initial_state(&self) -> Arc<S> {
        Arc::clone(&self.inner.initial)
    }

    /// Apply the reducer to one event.
    ///
    /// Returns `state` itself (same allocation) when no handler matches.
    pub fn apply(&self, state: &Arc<S>, event: &Event) -> Arc<S> {
        // Clone the entry out so handlers may re-enter `on`/`off`.
        let entry = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event.event_type())
            .cloned();

        match entry {
            Some(Entry::Update(handler)) => {
                Arc::new(handler(state.as_ref(), event.payload(), event.meta()))
            }
            Some(Entry::Reset) => self.initial_state(),
            None => Arc::clone(state),
        }
    }

    fn insert(&self, targets: impl IntoEventTypes, entry: Entry<S>) {
        let mut handlers = self.write();
        for event_type in targets.into_event_types() {
            handlers.insert(event_type, entry.clone());
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<EventType, Entry<S>>> {
        self.inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shorthand for [`Reducer::new`].
pub fn create_reducer<S: Send + Sync + 'static>(initial: S) -> Reducer<S> {
    Reducer::new(initial)
}

/// Named handlers for [`Reducer::create_events`].
pub struct Handlers<S> {
    entries: Vec<(String, Handler<S>)>,
}

impl<S> Default for Handlers<S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<S: 'static> Handlers<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler that reads the event payload.
    pub fn add<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&S, &Value) -> S + Send + Sync + 'static,
    {
        let handler: Handler<S> =
            Arc::new(move |state: &S, payload: &Value, _meta: &Value| handler(state, payload));
        self.entries.push((name.into(), handler));
        self
    }

    /// Add a handler for a payload-less event.
    pub fn add_trigger<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&S) -> S + Send + Sync + 'static,
    {
        let handler: Handler<S> =
            Arc::new(move |state: &S, _payload: &Value, _meta: &Value| handler(state));
        self.entries.push((name.into(), handler));
        self
    }
}

/// Ordered name → creator map produced by [`Reducer::create_events`].
#[derive(Debug, Clone, Default)]
pub struct EventCreators {
    creators: IndexMap<String, EventCreator>,
}

impl EventCreators {
    pub fn get(&self, name: &str) -> Option<&EventCreator> {
        self.creators.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EventCreator)> {
        self.creators.iter().map(|(name, c)| (name.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.creators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }
}

impl Index<&str> for EventCreators {
    type Output = EventCreator;

    /// Look up a creator by name.
    ///
    /// # Panics
    ///
    /// Panics if no creator is named `name`.
    fn index(&self, name: &str) -> &EventCreator {
        self.creators
            .get(name)
            .unwrap_or_else(|| panic!("no event creator named {:?}", name))
    }
}

impl IntoIterator for EventCreators {
    type Item = (String, EventCreator);
    type IntoIter = indexmap::map::IntoIter<String, EventCreator>;

    fn into_iter(self) -> Self::IntoIter {
        self.creators.into_iter()
    }
}

/// Object-safe view of a typed reducer, used inside a [`ReducerTree`].
pub trait AnyReducer: Send + Sync {
    fn initial_slice(&self) -> AnySlice;

    /// Apply to a type-erased slice. Returns `slice` itself when unchanged.
    fn apply_slice(&self, slice: &AnySlice, event: &Event) -> AnySlice;
}

impl<S: Send + Sync + 'static> AnyReducer for Reducer<S> {
    fn initial_slice(&self) -> AnySlice {
        self.initial_state()
    }

    fn apply_slice(&self, slice: &AnySlice, event: &Event) -> AnySlice {
        let typed = match Arc::clone(slice).downcast::<S>() {
            Ok(typed) => typed,
            Err(_) => {
                tracing::warn!(
                    event = %event.event_type(),
                    expected = std::any::type_name::<S>(),
                    "slice holds an unexpected type; leaving it untouched"
                );
                return Arc::clone(slice);
            }
        };
        let next = self.apply(&typed, event);
        if Arc::ptr_eq(&next, &typed) {
            Arc::clone(slice)
        } else {
            next as Arc<dyn Any + Send + Sync>
        }
    }
}

#[derive(Clone)]
enum Node {
    Reducer(Arc<dyn AnyReducer>),
    Branch(ReducerTree),
}

/// Structural composition of reducers over a keyed state shape.
///
/// Each key is governed by a reducer or by a nested tree. Applying the tree
/// rebuilds only the paths whose slices changed; when nothing changed the
/// input [`AppState`] is returned as-is.
#[derive(Clone, Default)]
pub struct ReducerTree {
    nodes: IndexMap<String, Node>,
}

impl fmt::Debug for ReducerTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes.keys()).finish()
    }
}

impl ReducerTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Govern `key` with a typed reducer.
    pub fn reducer<S: Send + Sync + 'static>(
        mut self,
        key: impl Into<String>,
        reducer: Reducer<S>,
    ) -> Self {
        self.nodes.insert(key.into(), Node::Reducer(Arc::new(reducer)));
        self
    }

    /// Govern `key` with a nested tree.
    pub fn branch(mut self, key: impl Into<String>, tree: ReducerTree) -> Self {
        self.nodes.insert(key.into(), Node::Branch(tree));
        self
    }

    /// Whether `key` is governed by this tree.
    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Merge `other` into this tree. Keys of `other` win on collision.
    pub(crate) fn merge(&mut self, other: ReducerTree) -> Vec<String> {
        let mut replaced = Vec::new();
        for (key, node) in other.nodes {
            if self.nodes.insert(key.clone(), node).is_some() {
                replaced.push(key);
            }
        }
        replaced
    }

    /// The state tree made of every reducer's initial state.
    pub fn initial_state(&self) -> AppState {
        let slices = self
            .nodes
            .iter()
            .map(|(key, node)| (key.clone(), node.initial_slice()))
            .collect();
        AppState::from_map(slices)
    }

    /// Apply every governed reducer to `event`.
    pub fn apply(&self, state: &AppState, event: &Event) -> AppState {
        let mut changed: Vec<(&str, Slice)> = Vec::new();

        for (key, node) in &self.nodes {
            let next = match state.slice(key) {
                Some(prev) => {
                    let next = node.apply(prev, event);
                    if next.ptr_eq(prev) {
                        continue;
                    }
                    next
                }
                None => node.apply(&node.initial_slice(), event),
            };
            changed.push((key.as_str(), next));
        }

        if changed.is_empty() {
            return state.clone();
        }

        let mut slices = state.to_map();
        for (key, slice) in changed {
            slices.insert(key.to_string(), slice);
        }
        AppState::from_map(slices)
    }
}

impl Node {
    fn initial_slice(&self) -> Slice {
        match self {
            Node::Reducer(reducer) => Slice::Leaf(reducer.initial_slice()),
            Node::Branch(tree) => Slice::Branch(tree.initial_state()),
        }
    }

    fn apply(&self, prev: &Slice, event: &Event) -> Slice {
        match (self, prev) {
            (Node::Reducer(reducer), Slice::Leaf(value)) => {
                Slice::Leaf(reducer.apply_slice(value, event))
            }
            (Node::Branch(tree), Slice::Branch(state)) => Slice::Branch(tree.apply(state, event)),
            // A replaced state put the wrong node kind here; rebuild from scratch.
            _ => self.apply(&self.initial_slice(), event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Counter {
        value: i64,
    }

    fn increment(state: &Counter, payload: &Value, _meta: &Value) -> Counter {
        Counter {
            value: state.value + payload.as_i64().unwrap_or(1),
        }
    }

    /// Deliberately not `Clone`.
    #[derive(Debug, PartialEq)]
    struct Session {
        token: String,
    }

    #[test]
    fn test_state_without_clone() {
        let login = EventCreator::new("Login");
        let logout = EventCreator::new("Logout");
        let reducer = Reducer::new(Session {
            token: String::new(),
        })
        .on(&login, |_: &Session, payload: &Value, _| Session {
            token: payload.as_str().unwrap_or_default().to_string(),
        })
        .reset(&logout);

        let state = reducer.apply(&reducer.initial_state(), &login.call("abc"));
        assert_eq!(state.token, "abc");
        let state = reducer.apply(&state, &logout.trigger());
        assert!(Arc::ptr_eq(&state, &reducer.initial_state()));
    }

    #[test]
    fn test_unknown_event_is_identity() {
        let reducer = Reducer::new(Counter::default());
        let state = reducer.initial_state();

        let next = reducer.apply(&state, &EventCreator::new("Unknown").trigger());
        assert!(Arc::ptr_eq(&state, &next));
    }

    #[test]
    fn test_handler_matches_isolated_application() {
        let add = EventCreator::new("Add");
        let reducer = Reducer::new(Counter { value: 10 }).on(&add, increment);
        let state = reducer.initial_state();
        let event = add.call(json!(5));

        let next = reducer.apply(&state, &event);
        assert_eq!(*next, increment(&state, event.payload(), event.meta()));
    }

    #[test]
    fn test_off_restores_identity() {
        let add = EventCreator::new("Add");
        let reducer = Reducer::new(Counter::default()).on(&add, increment);
        assert!(reducer.has(&add));

        reducer.off(&add);
        assert!(!reducer.has(&add));

        let state = reducer.initial_state();
        assert!(Arc::ptr_eq(&state, &reducer.apply(&state, &add.trigger())));

        // Removing again is a no-op.
        reducer.off(&add);
    }

    #[test]
    fn test_on_overwrites() {
        let add = EventCreator::new("Add");
        let reducer = Reducer::new(Counter::default())
            .on(&add, |s: &Counter, _, _| Counter { value: s.value + 1 })
            .on(&add, |s: &Counter, _, _| Counter { value: s.value + 100 });

        let state = reducer.apply(&reducer.initial_state(), &add.trigger());
        assert_eq!(state.value, 100);
    }

    #[test]
    fn test_on_accepts_lists_and_strings() {
        let a = EventCreator::new("A");
        let reducer = Reducer::new(Counter::default())
            .on(vec![EventType::from(&a), EventType::from("raw/b")], increment);

        assert!(reducer.has(&a));
        assert!(reducer.has("raw/b"));

        let state = reducer.apply(&reducer.initial_state(), &Event::trigger("raw/b"));
        assert_eq!(state.value, 1);
    }

    #[test]
    fn test_reset_returns_initial() {
        let add = EventCreator::new("Add");
        let clear = EventCreator::new("Clear");
        let reducer = Reducer::new(Counter::default())
            .on(&add, increment)
            .reset([&clear]);

        let state = reducer.apply(&reducer.initial_state(), &add.trigger());
        let state = reducer.apply(&state, &clear.call(json!("ignored")));
        assert!(Arc::ptr_eq(&state, &reducer.initial_state()));
    }

    #[test]
    fn test_create_events() {
        let reducer = Reducer::new(Counter::default());
        let events = reducer.create_events(
            Handlers::new()
                .add("set", |_: &Counter, payload: &Value| Counter {
                    value: payload.as_i64().unwrap_or_default(),
                })
                .add_trigger("bump", |s: &Counter| Counter { value: s.value + 1 }),
        );

        assert_eq!(events.len(), 2);
        assert_eq!(events["set"].description(), "set");
        assert!(reducer.has(&events["bump"]));

        let state = reducer.apply(&reducer.initial_state(), &events["set"].call(json!(7)));
        let state = reducer.apply(&state, &events["bump"].trigger());
        assert_eq!(state.value, 8);
    }

    #[test]
    fn test_handler_may_detach_itself() {
        let once = EventCreator::new("Once");
        let reducer = Reducer::new(Counter::default());
        let handle = reducer.clone();
        let target = once.clone();
        reducer.on(&once, move |s: &Counter, _, _| {
            handle.off(&target);
            Counter { value: s.value + 1 }
        });

        let state = reducer.apply(&reducer.initial_state(), &once.trigger());
        let state = reducer.apply(&state, &once.trigger());
        assert_eq!(state.value, 1);
    }

    #[test]
    fn test_tree_preserves_untouched_slices() {
        let add = EventCreator::new("Add");
        let left = Reducer::new(Counter::default()).on(&add, increment);
        let right = Reducer::new(Counter::default());
        let nested = Reducer::new(String::from("idle"));

        let tree = ReducerTree::new()
            .reducer("left", left)
            .reducer("right", right)
            .branch("nested", ReducerTree::new().reducer("status", nested));

        let state = tree.initial_state();

        let unchanged = tree.apply(&state, &EventCreator::new("Noop").trigger());
        assert!(unchanged.ptr_eq(&state));

        let next = tree.apply(&state, &add.trigger());
        assert!(!next.ptr_eq(&state));
        assert_eq!(next.get::<Counter>("left").unwrap().value, 1);
        assert!(next.slice("right").unwrap().ptr_eq(state.slice("right").unwrap()));
        assert!(next.slice("nested").unwrap().ptr_eq(state.slice("nested").unwrap()));
        assert_eq!(next.path::<String>(&["nested", "status"]).unwrap(), "idle");
    }

    #[test]
    fn test_tree_keeps_foreign_slices() {
        let add = EventCreator::new("Add");
        let tree = ReducerTree::new()
            .reducer("count", Reducer::new(Counter::default()).on(&add, increment));

        let state = AppState::builder()
            .leaf("count", Counter { value: 3 })
            .leaf("extra", 42u32)
            .build();

        let next = tree.apply(&state, &add.trigger());
        assert_eq!(next.get::<Counter>("count").unwrap().value, 4);
        assert_eq!(next.get::<u32>("extra"), Some(&42));
    }
}

//! Modules: named bundles merged into an app

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::effect::EffectCreator;
use crate::epic::{BoxEpic, Epic};
use crate::event::EventCreator;
use crate::reducer::{EventCreators, Reducer, ReducerTree};

/// A named api entry: plain event creator or effect.
#[derive(Debug, Clone)]
pub enum ApiEntry {
    Event(EventCreator),
    Effect(EffectCreator),
}

impl From<EventCreator> for ApiEntry {
    fn from(creator: EventCreator) -> Self {
        ApiEntry::Event(creator)
    }
}

impl From<EffectCreator> for ApiEntry {
    fn from(effect: EffectCreator) -> Self {
        ApiEntry::Effect(effect)
    }
}

/// A named bundle of reducers, api entries and epics.
///
/// # Example
///
/// ```ignore
/// let todos = Module::new("todos")
///     .reducer("todos", todos_reducer)
///     .events(todo_events)
///     .effect("load", load_todos)
///     .epic(load_on_open);
/// ```
#[derive(Default)]
pub struct Module {
    pub(crate) name: String,
    pub(crate) reducers: ReducerTree,
    pub(crate) api: IndexMap<String, ApiEntry>,
    pub(crate) epics: Vec<(String, BoxEpic)>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Govern the `key` slice of the app state with `reducer`.
    pub fn reducer<S: Send + Sync + 'static>(
        mut self,
        key: impl Into<String>,
        reducer: Reducer<S>,
    ) -> Self {
        self.reducers = self.reducers.reducer(key, reducer);
        self
    }

    /// Govern the `key` slice with a nested reducer tree.
    pub fn branch(mut self, key: impl Into<String>, tree: ReducerTree) -> Self {
        self.reducers = self.reducers.branch(key, tree);
        self
    }

    /// Expose an event creator on the app api.
    pub fn event(mut self, name: impl Into<String>, creator: EventCreator) -> Self {
        self.api.insert(name.into(), ApiEntry::Event(creator));
        self
    }

    /// Expose every creator of a [`Reducer::create_events`] map.
    pub fn events(mut self, creators: EventCreators) -> Self {
        for (name, creator) in creators {
            self.api.insert(name, ApiEntry::Event(creator));
        }
        self
    }

    /// Expose an effect on the app api; calling it runs through the app.
    pub fn effect(mut self, name: impl Into<String>, effect: EffectCreator) -> Self {
        self.api.insert(name.into(), ApiEntry::Effect(effect));
        self
    }

    /// Add an epic, named `<module>/epic-<n>` in logs and errors.
    pub fn epic<E: Epic>(mut self, epic: E) -> Self {
        let name = format!("{}/epic-{}", self.name, self.epics.len());
        self.epics.push((name, Arc::new(epic)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("reducers", &self.reducers)
            .field("api", &self.api.keys().collect::<Vec<_>>())
            .field("epics", &self.epics.len())
            .finish()
    }
}

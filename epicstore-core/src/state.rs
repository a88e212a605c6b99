//! Application state tree
//!
//! [`AppState`] is an immutable, reference-counted tree keyed by slice name.
//! Leaves hold the typed state of one reducer behind a type-erased `Arc`;
//! branches hold nested trees. Cloning is cheap and comparisons are by
//! reference, which lets subscribers skip work when nothing changed.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

/// Type-erased leaf value.
pub type AnySlice = Arc<dyn Any + Send + Sync>;

/// One node of the state tree.
#[derive(Clone)]
pub enum Slice {
    /// State owned by a single reducer.
    Leaf(AnySlice),
    /// A nested tree governed by a nested reducer map.
    Branch(AppState),
}

impl Slice {
    /// Wrap a typed value as a leaf.
    pub fn leaf<T: Any + Send + Sync>(value: T) -> Self {
        Slice::Leaf(Arc::new(value))
    }

    /// Whether both slices point to the same allocation.
    pub fn ptr_eq(&self, other: &Slice) -> bool {
        match (self, other) {
            (Slice::Leaf(a), Slice::Leaf(b)) => Arc::ptr_eq(a, b),
            (Slice::Branch(a), Slice::Branch(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slice::Leaf(_) => f.write_str("Leaf(..)"),
            Slice::Branch(state) => f.debug_tuple("Branch").field(state).finish(),
        }
    }
}

/// Snapshot of the whole application state.
///
/// Equality is reference equality: two snapshots are equal only when they
/// are the same committed state.
#[derive(Clone, Default)]
pub struct AppState {
    slices: Arc<IndexMap<String, Slice>>,
}

impl AppState {
    /// An empty state tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a state tree by hand.
    ///
    /// Mostly useful with [`App::dangerously_replace_state`](crate::App::dangerously_replace_state)
    /// and in tests.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }

    pub(crate) fn from_map(slices: IndexMap<String, Slice>) -> Self {
        Self {
            slices: Arc::new(slices),
        }
    }

    pub(crate) fn to_map(&self) -> IndexMap<String, Slice> {
        (*self.slices).clone()
    }

    /// Get a typed leaf by key.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        match self.slices.get(key)? {
            Slice::Leaf(value) => value.downcast_ref::<T>(),
            Slice::Branch(_) => None,
        }
    }

    /// Get a shared handle to a typed leaf.
    pub fn get_arc<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        match self.slices.get(key)? {
            Slice::Leaf(value) => Arc::clone(value).downcast::<T>().ok(),
            Slice::Branch(_) => None,
        }
    }

    /// Get a nested branch by key.
    pub fn branch(&self, key: &str) -> Option<&AppState> {
        match self.slices.get(key)? {
            Slice::Branch(state) => Some(state),
            Slice::Leaf(_) => None,
        }
    }

    /// Follow `path` through nested branches and return the typed leaf at its end.
    pub fn path<T: Any>(&self, path: &[&str]) -> Option<&T> {
        let (last, parents) = path.split_last()?;
        let mut node = self;
        for key in parents {
            node = node.branch(key)?;
        }
        node.get(last)
    }

    /// Raw slice access.
    pub fn slice(&self, key: &str) -> Option<&Slice> {
        self.slices.get(key)
    }

    /// Slice names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slices.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Whether both snapshots are the same committed state.
    pub fn ptr_eq(&self, other: &AppState) -> bool {
        Arc::ptr_eq(&self.slices, &other.slices)
    }
}

impl PartialEq for AppState {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.slices.iter()).finish()
    }
}

/// Builder for hand-assembled state trees.
#[derive(Default)]
pub struct AppStateBuilder {
    slices: IndexMap<String, Slice>,
}

impl AppStateBuilder {
    /// Insert a typed leaf.
    pub fn leaf<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.slices.insert(key.into(), Slice::leaf(value));
        self
    }

    /// Insert a nested branch.
    pub fn branch(mut self, key: impl Into<String>, state: AppState) -> Self {
        self.slices.insert(key.into(), Slice::Branch(state));
        self
    }

    pub fn build(self) -> AppState {
        AppState::from_map(self.slices)
    }
}

//! Bind a view to an app
//!
//! A consumer selects a value from every committed state (`map_state`),
//! builds api props once (`map_api`), merges both into the props handed to
//! a [`Component`], and re-renders only when the selected value changes.
//! State notifications are coalesced per tick by a [`NotificationBatcher`].
//!
//! # Example
//!
//! ```ignore
//! let mut mounted = Consumer::builder(&app)
//!     .map_state(|state| state.get::<Cart>("cart").cloned().unwrap_or_default())
//!     .render(|props: &ConsumerProps<Cart, Api>| draw(&props.state))
//!     .mount();
//!
//! // later
//! mounted.unmount();
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::{self, ThreadId};
use std::time::Duration;

use epicstore_core::{Api, App, AppState, Subscription};

use crate::batch::{NotificationBatcher, DEFAULT_TICK};
use crate::component::Component;

pub type MapState<S> = Arc<dyn Fn(&AppState) -> S + Send + Sync>;
pub type MapApi<A> = Arc<dyn Fn(&Api) -> A + Send + Sync>;
pub type MergeProps<S, A, P> = Arc<dyn Fn(&S, &A) -> P + Send + Sync>;

/// Props handed to the component when no `merge_props` is given.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerProps<S, A> {
    pub state: S,
    pub api: A,
}

/// Consumer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Notifications closer together than this render once.
    pub tick: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self { tick: DEFAULT_TICK }
    }
}

impl ConsumerConfig {
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn default_merge<S: Clone + 'static, A: Clone + 'static>() -> MergeProps<S, A, ConsumerProps<S, A>> {
    Arc::new(|state: &S, api: &A| ConsumerProps {
        state: state.clone(),
        api: api.clone(),
    })
}

/// Entry point for building consumers
pub struct Consumer;

impl Consumer {
    /// Start a consumer that selects the whole state and the full api.
    pub fn builder(app: &App) -> ConsumerBuilder<AppState, Api, ConsumerProps<AppState, Api>> {
        ConsumerBuilder {
            app: app.clone(),
            map_state: Arc::new(|state: &AppState| state.clone()),
            map_api: Arc::new(|api: &Api| api.clone()),
            merge_props: default_merge(),
            config: ConsumerConfig::default(),
        }
    }
}

/// Collects the selectors of a consumer.
///
/// `map_state` and `map_api` are only available before `merge_props`.
pub struct ConsumerBuilder<S, A, P> {
    app: App,
    map_state: MapState<S>,
    map_api: MapApi<A>,
    merge_props: MergeProps<S, A, P>,
    config: ConsumerConfig,
}

impl<S, A> ConsumerBuilder<S, A, ConsumerProps<S, A>>
where
    S: Clone + 'static,
    A: Clone + 'static,
{
    /// Select the value the component depends on.
    pub fn map_state<S2, F>(self, f: F) -> ConsumerBuilder<S2, A, ConsumerProps<S2, A>>
    where
        S2: Clone + 'static,
        F: Fn(&AppState) -> S2 + Send + Sync + 'static,
    {
        ConsumerBuilder {
            app: self.app,
            map_state: Arc::new(f),
            map_api: self.map_api,
            merge_props: default_merge(),
            config: self.config,
        }
    }

    /// Pick the dispatchers the component needs.
    pub fn map_api<A2, F>(self, f: F) -> ConsumerBuilder<S, A2, ConsumerProps<S, A2>>
    where
        A2: Clone + 'static,
        F: Fn(&Api) -> A2 + Send + Sync + 'static,
    {
        ConsumerBuilder {
            app: self.app,
            map_state: self.map_state,
            map_api: Arc::new(f),
            merge_props: default_merge(),
            config: self.config,
        }
    }
}

impl<S, A, P> ConsumerBuilder<S, A, P>
where
    S: PartialEq + Clone + Send + 'static,
    A: Send + Sync + 'static,
    P: 'static,
{
    /// Combine the selected state and api props into component props.
    pub fn merge_props<P2, F>(self, f: F) -> ConsumerBuilder<S, A, P2>
    where
        F: Fn(&S, &A) -> P2 + Send + Sync + 'static,
    {
        ConsumerBuilder {
            app: self.app,
            map_state: self.map_state,
            map_api: self.map_api,
            merge_props: Arc::new(f),
            config: self.config,
        }
    }

    pub fn config(mut self, config: ConsumerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tick(mut self, tick: Duration) -> Self {
        self.config.tick = tick;
        self
    }

    /// Render through a closure.
    pub fn render<F>(self, f: F) -> UnmountedConsumer<S, A, P>
    where
        F: FnMut(&P) + Send + 'static,
    {
        self.component(f)
    }

    /// Render through a component.
    pub fn component<C>(self, component: C) -> UnmountedConsumer<S, A, P>
    where
        C: Component<P> + 'static,
    {
        UnmountedConsumer {
            builder: self,
            component: Box::new(component),
        }
    }
}

/// A fully described consumer, not yet subscribed.
pub struct UnmountedConsumer<S, A, P> {
    builder: ConsumerBuilder<S, A, P>,
    component: Box<dyn Component<P>>,
}

impl<S, A, P> UnmountedConsumer<S, A, P>
where
    S: PartialEq + Clone + Send + 'static,
    A: Send + Sync + 'static,
    P: 'static,
{
    /// Render once with the current state and subscribe for changes.
    pub fn mount(self) -> MountedConsumer<S, A, P> {
        let ConsumerBuilder {
            app,
            map_state,
            map_api,
            merge_props,
            config,
        } = self.builder;

        let api_props = Arc::new(map_api(&app.api()));
        let view = Arc::new(View {
            app,
            map_state: RwLock::new(map_state),
            map_api: RwLock::new(map_api),
            merge_props: RwLock::new(merge_props),
            api_props: RwLock::new(api_props),
            last: Mutex::new(None),
            component: Mutex::new(self.component),
            rendering_on: Mutex::new(None),
            renders: AtomicUsize::new(0),
            mounted: AtomicBool::new(true),
        });

        let state = view.app.state();
        view.refresh(&state, true);
        let (subscription, batcher) = subscribe(&view, config.tick);
        tracing::debug!(app = view.app.name(), "consumer mounted");

        MountedConsumer {
            view,
            subscription,
            batcher,
            config,
        }
    }
}

struct View<S, A, P> {
    app: App,
    map_state: RwLock<MapState<S>>,
    map_api: RwLock<MapApi<A>>,
    merge_props: RwLock<MergeProps<S, A, P>>,
    api_props: RwLock<Arc<A>>,
    last: Mutex<Option<S>>,
    component: Mutex<Box<dyn Component<P>>>,
    rendering_on: Mutex<Option<ThreadId>>,
    renders: AtomicUsize,
    mounted: AtomicBool,
}

/// Marks the current thread as rendering until dropped.
struct RenderingGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl<'a> RenderingGuard<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        *lock(slot) = Some(thread::current().id());
        Self(slot)
    }
}

impl Drop for RenderingGuard<'_> {
    fn drop(&mut self) {
        lock(self.0).take();
    }
}

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn write<T>(lock: &RwLock<T>, value: T) {
    *lock.write().unwrap_or_else(PoisonError::into_inner) = value;
}

impl<S, A, P> View<S, A, P>
where
    S: PartialEq + Clone,
{
    /// Select from `state` and render unless the selection is unchanged.
    ///
    /// A refresh requested from inside `render` on the same thread is
    /// dropped and the cached selection cleared, so the next notification
    /// renders again.
    fn refresh(&self, state: &AppState, force: bool) {
        if !self.mounted.load(Ordering::SeqCst) {
            return;
        }
        if *lock(&self.rendering_on) == Some(thread::current().id()) {
            lock(&self.last).take();
            return;
        }
        let selected = read(&self.map_state)(state);
        {
            let mut last = lock(&self.last);
            if !force && last.as_ref() == Some(&selected) {
                tracing::trace!("selection unchanged; skipping render");
                return;
            }
            *last = Some(selected.clone());
        }

        let api = read(&self.api_props);
        let props = read(&self.merge_props)(&selected, &*api);

        let mut component = lock(&self.component);
        let _rendering = RenderingGuard::enter(&self.rendering_on);
        component.render(&props);
        self.renders.fetch_add(1, Ordering::SeqCst);
    }
}

fn subscribe<S, A, P>(view: &Arc<View<S, A, P>>, tick: Duration) -> (Subscription, NotificationBatcher)
where
    S: PartialEq + Clone + Send + 'static,
    A: Send + Sync + 'static,
    P: 'static,
{
    let weak: Weak<View<S, A, P>> = Arc::downgrade(view);
    let batcher = NotificationBatcher::new(tick, move |state| {
        if let Some(view) = weak.upgrade() {
            view.refresh(&state, false);
        }
    });
    let sink = batcher.clone();
    let subscription = view.app.subscribe(move |state| sink.notify(state.clone()));
    (subscription, batcher)
}

/// A live consumer. Dropping it unmounts.
pub struct MountedConsumer<S, A, P> {
    view: Arc<View<S, A, P>>,
    subscription: Subscription,
    batcher: NotificationBatcher,
    config: ConsumerConfig,
}

impl<S, A, P> MountedConsumer<S, A, P>
where
    S: PartialEq + Clone + Send + 'static,
    A: Send + Sync + 'static,
    P: 'static,
{
    /// Replace the state selector, resubscribe and re-render.
    pub fn set_map_state<F>(&mut self, f: F)
    where
        F: Fn(&AppState) -> S + Send + Sync + 'static,
    {
        write(&self.view.map_state, Arc::new(f) as MapState<S>);
        self.remount();
    }

    /// Replace the api selector and re-render.
    pub fn set_map_api<F>(&mut self, f: F)
    where
        F: Fn(&Api) -> A + Send + Sync + 'static,
    {
        write(&self.view.map_api, Arc::new(f) as MapApi<A>);
        self.remount();
    }

    /// Replace the props merger and re-render.
    pub fn set_merge_props<F>(&mut self, f: F)
    where
        F: Fn(&S, &A) -> P + Send + Sync + 'static,
    {
        write(&self.view.merge_props, Arc::new(f) as MergeProps<S, A, P>);
        self.remount();
    }

    /// Rebuild api props, re-render, and swap in a fresh subscription.
    fn remount(&mut self) {
        if !self.is_mounted() {
            return;
        }
        self.subscription.unsubscribe();
        self.batcher.close();

        let api = self.view.app.api();
        write(&self.view.api_props, Arc::new(read(&self.view.map_api)(&api)));
        let state = self.view.app.state();
        self.view.refresh(&state, true);
        let (subscription, batcher) = subscribe(&self.view, self.config.tick);
        self.subscription = subscription;
        self.batcher = batcher;
    }

    /// Deliver any batched state now instead of at the end of the tick.
    pub fn flush(&self) {
        self.batcher.flush();
    }
}

impl<S, A, P> MountedConsumer<S, A, P> {
    /// Close the subscription and drop pending notifications. Idempotent.
    pub fn unmount(&mut self) {
        if !self.view.mounted.swap(false, Ordering::SeqCst) {
            return;
        }
        self.subscription.unsubscribe();
        self.batcher.close();
        lock(&self.view.component).unmounted();
        tracing::debug!(app = self.view.app.name(), "consumer unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.view.mounted.load(Ordering::SeqCst)
    }

    /// The current app subscription.
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Number of renders so far, the initial one included.
    pub fn render_count(&self) -> usize {
        self.view.renders.load(Ordering::SeqCst)
    }

    /// The api props built by `map_api`.
    pub fn api_props(&self) -> Arc<A> {
        read(&self.view.api_props)
    }

    pub fn config(&self) -> ConsumerConfig {
        self.config
    }
}

impl<S, A, P> Drop for MountedConsumer<S, A, P> {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl<S, A, P> fmt::Debug for MountedConsumer<S, A, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedConsumer")
            .field("app", &self.view.app.name())
            .field("mounted", &self.is_mounted())
            .field("renders", &self.render_count())
            .field("subscription", &self.subscription)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epicstore_core::{create_app, EventCreator, Module, Reducer};

    fn counter_app(add: &EventCreator) -> App {
        let count = Reducer::new(0i64).on(add, |n: &i64, _, _| n + 1);
        create_app("test", [Module::new("counter").reducer("count", count)]).unwrap()
    }

    #[test]
    fn test_mount_renders_immediately() {
        let add = EventCreator::new("Add");
        let app = counter_app(&add);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let mounted = Consumer::builder(&app)
            .map_state(|state| state.get::<i64>("count").copied().unwrap_or_default())
            .render(move |props: &ConsumerProps<i64, Api>| sink.lock().unwrap().push(props.state))
            .mount();

        assert_eq!(*seen.lock().unwrap(), vec![0]);
        assert_eq!(mounted.render_count(), 1);
        assert!(!mounted.api_props().contains("nothing"));
    }

    #[test]
    fn test_without_runtime_every_change_renders() {
        let add = EventCreator::new("Add");
        let app = counter_app(&add);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let _mounted = Consumer::builder(&app)
            .map_state(|state| state.get::<i64>("count").copied().unwrap_or_default())
            .render(move |props: &ConsumerProps<i64, Api>| sink.lock().unwrap().push(props.state))
            .mount();

        app.dispatch(add.trigger()).unwrap();
        app.dispatch(add.trigger()).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_drop_unmounts() {
        let add = EventCreator::new("Add");
        let app = counter_app(&add);
        let renders = Arc::new(AtomicUsize::new(0));

        let counter = renders.clone();
        let mounted = Consumer::builder(&app)
            .render(move |_: &ConsumerProps<AppState, Api>| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .mount();
        drop(mounted);

        app.dispatch(add.trigger()).unwrap();
        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }
}

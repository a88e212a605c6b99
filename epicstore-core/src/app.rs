//! The app: state container, dispatch loop and epic pipeline
//!
//! An [`App`] owns the reducer tree, the committed [`AppState`], the running
//! epics and the subscriber list. Dispatch is serialized through a single
//! drain loop:
//!
//! - a dispatch from the thread currently draining (a subscriber, an epic,
//!   a middleware) is queued and processed before the outer dispatch returns;
//! - a dispatch from any other thread waits for the current drain to finish
//!   and then drains the queue itself;
//! - epic outputs and effect results are polled with a waker owned by the
//!   app; when an async result arrives, the waking thread drains the queue.
//!
//! # Example
//!
//! ```
//! use epicstore_core::{create_app, EventCreator, Module, Reducer};
//!
//! #[derive(Default)]
//! struct Counter { value: i64 }
//!
//! let increment = EventCreator::new("Increment");
//! let counter = Reducer::new(Counter::default())
//!     .on(&increment, |c: &Counter, _, _| Counter { value: c.value + 1 });
//!
//! let app = create_app("counter", [Module::new("counter")
//!     .reducer("counter", counter)
//!     .event("increment", increment.clone())]).unwrap();
//!
//! app.dispatch(increment.trigger()).unwrap();
//! app.api().trigger("increment").unwrap();
//! assert_eq!(app.state().get::<Counter>("counter").unwrap().value, 2);
//! ```

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, TryLockError, Weak};
use std::task::{Context, Poll, Waker};
use std::thread::{self, ThreadId};

use futures::stream::{SelectAll, StreamExt};
use futures::task::ArcWake;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::builtin;
use crate::config::{AppConfig, EpicFailurePolicy};
use crate::effect::{panic_message, EffectCreator};
use crate::epic::{guard, read_state, Epic, EpicSources, PipelineStream, StateCell};
use crate::event::{Event, EventType};
use crate::event_log::{EventLog, EventLogEntry};
use crate::middleware::{ComposedMiddleware, LoggingMiddleware, Middleware};
use crate::module::{ApiEntry, Module};
use crate::reducer::ReducerTree;
use crate::state::AppState;
use crate::{Result, StoreError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lifecycle of an app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStatus {
    /// Modules are merged; epics are being wired.
    Constructed,
    /// Accepting dispatches.
    Running,
    /// Torn down; dispatches fail with [`StoreError::AppStopped`].
    Stopped,
}

type Listener = Box<dyn Fn(&AppState) + Send + Sync>;

struct Subscriber {
    closed: AtomicBool,
    listener: Listener,
}

/// Handle returned by [`App::subscribe`]
///
/// Dropping the handle does not unsubscribe.
pub struct Subscription {
    subscriber: Arc<Subscriber>,
    app: Weak<AppInner>,
}

impl Subscription {
    /// Stop receiving notifications. Idempotent.
    pub fn unsubscribe(&self) {
        self.subscriber.closed.store(true, Ordering::SeqCst);
        if let Some(app) = self.app.upgrade() {
            lock(&app.subscribers).retain(|s| !Arc::ptr_eq(s, &self.subscriber));
        }
    }

    /// Whether the subscription was closed, by `unsubscribe` or by app teardown.
    pub fn is_closed(&self) -> bool {
        self.subscriber.closed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Handle to an epic added with [`App::attach_epic`]
#[derive(Debug, Clone)]
pub struct EpicHandle {
    name: String,
    token: CancellationToken,
}

impl EpicHandle {
    /// Stop the epic. Events it already emitted stay dispatched.
    pub fn detach(&self) {
        self.token.cancel();
    }

    /// Whether the epic was detached or the app stopped.
    pub fn is_detached(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

struct PipelineWaker(Weak<AppInner>);

impl ArcWake for PipelineWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        if let Some(app) = arc_self.0.upgrade() {
            app.schedule_poll();
        }
    }
}

struct AppInner {
    name: String,
    config: AppConfig,
    reducers: ReducerTree,
    initial: AppState,
    state: StateCell,
    status: RwLock<AppStatus>,
    stopping: AtomicBool,
    api: IndexMap<String, ApiEntry>,
    middleware: Mutex<ComposedMiddleware>,
    event_log: Mutex<EventLog>,
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
    sources: Arc<EpicSources>,
    queue: Mutex<VecDeque<Event>>,
    replacements: Mutex<VecDeque<AppState>>,
    drain_lock: Mutex<()>,
    owner: Mutex<Option<ThreadId>>,
    repoll: AtomicBool,
    pipeline: Mutex<SelectAll<PipelineStream>>,
    incoming: Mutex<Vec<PipelineStream>>,
    attached: AtomicUsize,
    shutdown: CancellationToken,
    waker: Waker,
    runtime: OnceLock<Handle>,
    in_flight: watch::Sender<HashSet<EventType>>,
}

/// Resets the drain owner; drops queued events if a reducer panicked.
struct OwnerReset<'a>(&'a AppInner);

impl Drop for OwnerReset<'_> {
    fn drop(&mut self) {
        *lock(&self.0.owner) = None;
        if thread::panicking() {
            lock(&self.0.queue).clear();
        }
    }
}

impl AppInner {
    fn status(&self) -> AppStatus {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: AppStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Fails once the app stopped or a teardown is queued.
    fn ensure_running(&self) -> Result<()> {
        if self.stopping.load(Ordering::SeqCst) || self.status() == AppStatus::Stopped {
            return Err(StoreError::AppStopped(self.name.clone()));
        }
        Ok(())
    }

    fn is_owner(&self) -> bool {
        *lock(&self.owner) == Some(thread::current().id())
    }

    fn needs_drain(&self) -> bool {
        self.repoll.load(Ordering::SeqCst) || !lock(&self.queue).is_empty()
    }

    fn start_epic(&self, name: String, epic: &dyn Epic, token: CancellationToken) {
        let (events, states) = self.sources.streams();
        let stream = guard(name, epic, events, states, token.cancelled_owned());
        self.push_stream(stream);
    }

    fn push_stream(&self, stream: PipelineStream) {
        lock(&self.incoming).push(stream);
        self.repoll.store(true, Ordering::SeqCst);
    }

    /// Drain the queue, blocking while another thread drains.
    fn drain(&self) -> Result<()> {
        if self.is_owner() {
            // The outer drain on this thread picks the work up.
            self.repoll.store(true, Ordering::SeqCst);
            return Ok(());
        }
        loop {
            let held = lock(&self.drain_lock);
            let result = self.run_as_owner();
            drop(held);
            result?;
            if !self.needs_drain() {
                return Ok(());
            }
        }
    }

    /// Drain from the waker. Never blocks; the current holder sees `repoll`.
    fn schedule_poll(&self) {
        self.repoll.store(true, Ordering::SeqCst);
        loop {
            let held = match self.drain_lock.try_lock() {
                Ok(held) => held,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            let result = catch_unwind(AssertUnwindSafe(|| self.run_as_owner()));
            drop(held);
            match result {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::error!(app = %self.name, %error, "async dispatch failed");
                }
                Err(panic) => {
                    tracing::error!(
                        app = %self.name,
                        message = %panic_message(&*panic),
                        "reducer panicked during async dispatch"
                    );
                }
            }
            if !self.needs_drain() {
                return;
            }
        }
    }

    fn run_as_owner(&self) -> Result<()> {
        // Wakers may fire on threads outside the runtime the app lives in;
        // effect futures polled there still need its timers and IO.
        let _context = match Handle::try_current() {
            Ok(handle) => {
                let _ = self.runtime.set(handle);
                None
            }
            Err(_) => self.runtime.get().map(Handle::enter),
        };
        *lock(&self.owner) = Some(thread::current().id());
        let _reset = OwnerReset(self);

        loop {
            self.repoll.store(false, Ordering::SeqCst);
            self.poll_pipeline()?;

            let next = lock(&self.queue).pop_front();
            match next {
                Some(event) => self.process(event),
                None if self.repoll.load(Ordering::SeqCst) => continue,
                None => return Ok(()),
            }
        }
    }

    /// Poll epics and effect runs until none is ready, queueing their output.
    fn poll_pipeline(&self) -> Result<()> {
        let mut pipeline = lock(&self.pipeline);
        for stream in lock(&self.incoming).drain(..) {
            pipeline.push(stream);
        }

        let mut cx = Context::from_waker(&self.waker);
        loop {
            if self.status() == AppStatus::Stopped {
                self.finish_pipeline(&mut pipeline, &mut cx);
                return Ok(());
            }
            if pipeline.is_empty() {
                return Ok(());
            }

            match pipeline.poll_next_unpin(&mut cx) {
                Poll::Ready(Some(Ok(event))) => lock(&self.queue).push_back(event),
                Poll::Ready(Some(Err(failure))) => match self.config.epic_failure {
                    EpicFailurePolicy::Isolate => {
                        tracing::error!(
                            app = %self.name,
                            epic = %failure.epic,
                            message = %failure.message,
                            "epic failed; siblings keep running"
                        );
                    }
                    EpicFailurePolicy::Propagate => {
                        tracing::error!(
                            app = %self.name,
                            epic = %failure.epic,
                            message = %failure.message,
                            "epic failed; dropping the pipeline"
                        );
                        *pipeline = SelectAll::new();
                        lock(&self.incoming).clear();
                        self.settle_all();
                        return Err(StoreError::EpicFailed {
                            epic: failure.epic,
                            message: failure.message,
                        });
                    }
                },
                Poll::Ready(None) | Poll::Pending => return Ok(()),
            }
        }
    }

    /// Let epics observe their completed inputs, then drop the pipeline.
    fn finish_pipeline(&self, pipeline: &mut SelectAll<PipelineStream>, cx: &mut Context<'_>) {
        lock(&self.incoming).clear();
        while let Poll::Ready(Some(item)) = pipeline.poll_next_unpin(cx) {
            if let Ok(event) = item {
                tracing::debug!(app = %self.name, event = %event.event_type(), "app stopped; event dropped");
            }
        }
        *pipeline = SelectAll::new();
        self.shutdown.cancel();
    }

    fn process(&self, event: Event) {
        if self.status() == AppStatus::Stopped {
            tracing::debug!(app = %self.name, event = %event.event_type(), "app stopped; event dropped");
            return;
        }

        lock(&self.middleware).before(&event);
        lock(&self.event_log).record(&event);

        let prev = read_state(&self.state);
        let next = if builtin::is_reset_state(&event) {
            self.initial.clone()
        } else if builtin::is_replace_state(&event) {
            match lock(&self.replacements).pop_front() {
                Some(replacement) => replacement,
                None => {
                    tracing::warn!(
                        app = %self.name,
                        "replace-state event without a replacement; use App::dangerously_replace_state"
                    );
                    prev.clone()
                }
            }
        } else {
            self.reducers.apply(&prev, &event)
        };

        let changed = !next.ptr_eq(&prev);
        if changed {
            *self.state.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        }

        lock(&self.event_log).update_last_state_changed(changed);
        lock(&self.middleware).after(&event, changed);
        self.track_effect(&event);

        self.sources.push_event(&event, &next);
        if changed {
            self.sources.push_state(&next);
            self.notify(&next);
        }

        if builtin::is_epic_end(&event) {
            self.teardown();
        }
    }

    /// Follow effect runs from their `start` event to their completion marker.
    fn track_effect(&self, event: &Event) {
        let started = EffectCreator::completion_of(event);
        self.in_flight.send_if_modified(|pending| match started {
            Some(marker) => pending.insert(marker),
            None => pending.remove(event.event_type()),
        });
    }

    /// Forget every in-flight run so `when_ready` waiters resolve.
    fn settle_all(&self) {
        self.in_flight.send_if_modified(|pending| {
            let had_runs = !pending.is_empty();
            pending.clear();
            had_runs
        });
    }

    fn notify(&self, state: &AppState) {
        // Listeners may subscribe or unsubscribe while we iterate.
        let subscribers = lock(&self.subscribers).clone();
        for subscriber in subscribers {
            if !subscriber.closed.load(Ordering::SeqCst) {
                (subscriber.listener)(state);
            }
        }
    }

    fn teardown(&self) {
        {
            let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
            if *status == AppStatus::Stopped {
                return;
            }
            *status = AppStatus::Stopped;
        }

        // The drain loop polls the pipeline once more and then drops it.
        self.sources.complete();
        self.repoll.store(true, Ordering::SeqCst);
        for subscriber in std::mem::take(&mut *lock(&self.subscribers)) {
            subscriber.closed.store(true, Ordering::SeqCst);
        }
        lock(&self.queue).clear();
        lock(&self.replacements).clear();
        self.settle_all();

        tracing::info!(app = %self.name, "app stopped");
    }
}

/// Builder for [`App`]
pub struct AppBuilder {
    name: String,
    modules: Vec<Module>,
    config: AppConfig,
    middleware: Vec<Box<dyn Middleware>>,
}

impl AppBuilder {
    pub fn module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    pub fn modules(mut self, modules: impl IntoIterator<Item = Module>) -> Self {
        self.modules.extend(modules);
        self
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a middleware. Middleware runs in insertion order.
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Box::new(middleware));
        self
    }

    /// Merge the modules, start the epics and enter `Running`.
    ///
    /// Fails only when an epic panics while starting under
    /// [`EpicFailurePolicy::Propagate`].
    pub fn build(self) -> Result<App> {
        let module_count = self.modules.len();
        let mut reducers = ReducerTree::new();
        let mut api = IndexMap::new();
        let mut epics = Vec::new();

        for module in self.modules {
            for key in reducers.merge(module.reducers) {
                tracing::warn!(app = %self.name, module = %module.name, slice = %key, "slice redefined by a later module");
            }
            for (name, entry) in module.api {
                if api.contains_key(&name) {
                    tracing::warn!(app = %self.name, module = %module.name, api = %name, "api entry redefined by a later module");
                }
                api.insert(name, entry);
            }
            epics.extend(module.epics);
        }

        let mut middleware = ComposedMiddleware::new();
        if self.config.log_dispatch {
            middleware.add(LoggingMiddleware::new());
        }
        for m in self.middleware {
            middleware.add_boxed(m);
        }

        let initial = reducers.initial_state();
        let state: StateCell = Arc::new(RwLock::new(initial.clone()));
        let name = self.name;
        let config = self.config;

        let inner = Arc::new_cyclic(|weak: &Weak<AppInner>| AppInner {
            event_log: Mutex::new(EventLog::new(config.event_log.clone())),
            sources: EpicSources::new(Arc::clone(&state)),
            name,
            config,
            reducers,
            initial,
            state,
            status: RwLock::new(AppStatus::Constructed),
            stopping: AtomicBool::new(false),
            api,
            middleware: Mutex::new(middleware),
            subscribers: Mutex::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            replacements: Mutex::new(VecDeque::new()),
            drain_lock: Mutex::new(()),
            owner: Mutex::new(None),
            repoll: AtomicBool::new(false),
            pipeline: Mutex::new(SelectAll::new()),
            incoming: Mutex::new(Vec::new()),
            attached: AtomicUsize::new(0),
            shutdown: CancellationToken::new(),
            waker: futures::task::waker(Arc::new(PipelineWaker(weak.clone()))),
            runtime: OnceLock::new(),
            in_flight: watch::channel(HashSet::new()).0,
        });
        if let Ok(handle) = Handle::try_current() {
            let _ = inner.runtime.set(handle);
        }

        let epic_count = epics.len();
        for (epic_name, epic) in epics {
            inner.start_epic(epic_name, &*epic, inner.shutdown.child_token());
        }

        inner.set_status(AppStatus::Running);
        tracing::info!(
            app = %inner.name,
            modules = module_count,
            epics = epic_count,
            "app running"
        );

        let app = App { inner };
        app.inner.drain()?;
        Ok(app)
    }
}

/// A running app
///
/// Cheap to clone; all clones drive the same store.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl App {
    pub fn builder(name: impl Into<String>) -> AppBuilder {
        AppBuilder {
            name: name.into(),
            modules: Vec::new(),
            config: AppConfig::default(),
            middleware: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn status(&self) -> AppStatus {
        self.inner.status()
    }

    /// The last committed state.
    pub fn state(&self) -> AppState {
        read_state(&self.inner.state)
    }

    /// Dispatch an event.
    ///
    /// Returns once the event and everything it synchronously caused
    /// (subscriber dispatches, epic outputs) was processed. Called while
    /// this thread is already dispatching, the event is queued and `Ok` is
    /// returned immediately.
    ///
    /// Once [`epic_end`](builtin::epic_end) is queued, later dispatches fail
    /// with [`StoreError::AppStopped`] even before the teardown ran.
    pub fn dispatch(&self, event: Event) -> Result<()> {
        self.inner.ensure_running()?;
        if builtin::is_epic_end(&event) {
            self.inner.stopping.store(true, Ordering::SeqCst);
        }
        lock(&self.inner.queue).push_back(event);
        self.inner.drain()
    }

    /// Wait until every effect run started so far has emitted its
    /// completion marker.
    ///
    /// Runs are tracked from their `start` event, including runs started by
    /// epics. Resolves immediately when nothing is in flight, and when the
    /// app stops. A run dropped before completing (its epic detached) is
    /// never settled.
    pub async fn when_ready(&self) {
        let started = self.inner.in_flight.borrow().clone();
        if started.is_empty() {
            return;
        }
        let mut rx = self.inner.in_flight.subscribe();
        let _ = rx
            .wait_for(|pending| started.iter().all(|marker| !pending.contains(marker)))
            .await;
    }

    /// Number of effect runs between `start` and completion.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.borrow().len()
    }

    /// Dispatch events in order, e.g. a recorded [`event_log`](Self::event_log).
    ///
    /// Epics see replayed events like any other; replay into an app whose
    /// epics should not fire again.
    pub fn replay(&self, events: impl IntoIterator<Item = Event>) -> Result<()> {
        for event in events {
            self.dispatch(event)?;
        }
        Ok(())
    }

    /// Call `listener` with every committed state that differs by reference
    /// from the previous one.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AppState) + Send + Sync + 'static,
    {
        let stopped = self.status() == AppStatus::Stopped;
        let subscriber = Arc::new(Subscriber {
            closed: AtomicBool::new(stopped),
            listener: Box::new(listener),
        });
        if !stopped {
            lock(&self.inner.subscribers).push(Arc::clone(&subscriber));
        }
        Subscription {
            subscriber,
            app: Arc::downgrade(&self.inner),
        }
    }

    pub fn api(&self) -> Api {
        Api { app: self.clone() }
    }

    /// Invoke `effect` and dispatch its events as they arrive.
    pub fn call_effect(&self, effect: &EffectCreator, payload: impl Into<Value>) -> Result<()> {
        self.inner.ensure_running()?;
        let run = effect.call(payload)?;
        self.inner.push_stream(run.map(Ok).boxed());
        self.inner.drain()
    }

    /// Start an extra epic on the running app.
    pub fn attach_epic<E: Epic>(&self, epic: E) -> Result<EpicHandle> {
        self.inner.ensure_running()?;
        let n = self.inner.attached.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}/attached-{}", self.inner.name, n);
        let token = self.inner.shutdown.child_token();

        self.inner.start_epic(name.clone(), &epic, token.clone());
        self.inner.drain()?;
        Ok(EpicHandle { name, token })
    }

    /// Snapshot of the event log.
    pub fn event_log(&self) -> Vec<EventLogEntry> {
        lock(&self.inner.event_log).entries().cloned().collect()
    }

    /// Tear the app down through the [`epic_end`](builtin::epic_end) event.
    ///
    /// No-op when already stopped.
    pub fn stop(&self) -> Result<()> {
        match self.dispatch(builtin::epic_end().trigger()) {
            Err(StoreError::AppStopped(_)) => Ok(()),
            other => other,
        }
    }

    /// Overwrite the whole state without running reducers.
    ///
    /// Debug only: the new state skips every reducer invariant.
    pub fn dangerously_replace_state(&self, state: AppState) -> Result<()> {
        self.inner.ensure_running()?;
        lock(&self.inner.replacements).push_back(state);
        self.dispatch(builtin::dangerously_replace_state().trigger())
    }

    /// Restore the initial state of every reducer.
    ///
    /// Debug only.
    pub fn dangerously_reset_state(&self) -> Result<()> {
        self.dispatch(builtin::dangerously_reset_state().trigger())
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.inner.name)
            .field("status", &self.status())
            .field("slices", &self.inner.reducers)
            .finish()
    }
}

/// Build an app from modules with the default config.
pub fn create_app(name: impl Into<String>, modules: impl IntoIterator<Item = Module>) -> Result<App> {
    App::builder(name).modules(modules).build()
}

/// Name-addressed dispatchers aggregated from every module.
#[derive(Debug, Clone)]
pub struct Api {
    app: App,
}

impl Api {
    /// Dispatch the named event, or run the named effect, with `payload`.
    pub fn call(&self, name: &str, payload: impl Into<Value>) -> Result<()> {
        let entry = self
            .app
            .inner
            .api
            .get(name)
            .ok_or_else(|| StoreError::UnknownApi(name.to_string()))?;
        dispatch_entry(&self.app, entry, payload.into())
    }

    /// Call without a payload.
    pub fn trigger(&self, name: &str) -> Result<()> {
        self.call(name, Value::Null)
    }

    /// A dispatcher bound to one name.
    pub fn get(&self, name: &str) -> Option<BoundEvent> {
        self.app.inner.api.get(name).map(|entry| BoundEvent {
            app: self.app.clone(),
            entry: entry.clone(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.app.inner.api.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.app.inner.api.keys().map(String::as_str)
    }
}

/// An api entry bound to its app.
#[derive(Debug, Clone)]
pub struct BoundEvent {
    app: App,
    entry: ApiEntry,
}

impl BoundEvent {
    pub fn call(&self, payload: impl Into<Value>) -> Result<()> {
        dispatch_entry(&self.app, &self.entry, payload.into())
    }

    pub fn trigger(&self) -> Result<()> {
        self.call(Value::Null)
    }

    pub fn entry(&self) -> &ApiEntry {
        &self.entry
    }
}

fn dispatch_entry(app: &App, entry: &ApiEntry, payload: Value) -> Result<()> {
    match entry {
        ApiEntry::Event(creator) => app.dispatch(creator.call(payload)),
        ApiEntry::Effect(effect) => app.call_effect(effect, payload),
    }
}

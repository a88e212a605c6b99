//! Notification coalescing
//!
//! A [`NotificationBatcher`] sits between an app subscription and a slow
//! consumer. Every notification inside one tick overwrites the pending
//! state; when the tick elapses the latest state is delivered once.
//!
//! # Example
//!
//! ```ignore
//! let batcher = NotificationBatcher::new(Duration::from_millis(16), |state| redraw(&state));
//! let subscription = app.subscribe({
//!     let batcher = batcher.clone();
//!     move |state| batcher.notify(state.clone())
//! });
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use epicstore_core::AppState;
use tokio::task::AbortHandle;

/// Default tick: one frame at 60 Hz.
pub const DEFAULT_TICK: Duration = Duration::from_millis(16);

type Deliver = Box<dyn Fn(AppState) + Send + Sync>;

struct BatcherInner {
    tick: Duration,
    deliver: Deliver,
    pending: Mutex<Option<AppState>>,
    scheduled: AtomicBool,
    closed: AtomicBool,
    timer: Mutex<Option<AbortHandle>>,
    deliveries: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BatcherInner {
    fn flush(&self) {
        // Clear the flag first so a notify racing with us schedules a new tick.
        self.scheduled.store(false, Ordering::SeqCst);
        let Some(state) = lock(&self.pending).take() else {
            return;
        };
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        self.deliveries.fetch_add(1, Ordering::SeqCst);
        (self.deliver)(state);
    }
}

/// Coalesces state notifications into one delivery per tick.
///
/// Cloning yields a handle to the same batcher.
#[derive(Clone)]
pub struct NotificationBatcher {
    inner: Arc<BatcherInner>,
}

impl NotificationBatcher {
    pub fn new<F>(tick: Duration, deliver: F) -> Self
    where
        F: Fn(AppState) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(BatcherInner {
                tick,
                deliver: Box::new(deliver),
                pending: Mutex::new(None),
                scheduled: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                timer: Mutex::new(None),
                deliveries: AtomicUsize::new(0),
            }),
        }
    }

    /// Record `state` as the latest and make sure a delivery is scheduled.
    ///
    /// Outside a tokio runtime there is no tick to wait for, so the state
    /// is delivered immediately.
    pub fn notify(&self, state: AppState) {
        if self.is_closed() {
            return;
        }
        *lock(&self.inner.pending) = Some(state);
        if self.inner.scheduled.swap(true, Ordering::SeqCst) {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let inner = Arc::clone(&self.inner);
                let tick = self.inner.tick;
                let task = runtime.spawn(async move {
                    tokio::time::sleep(tick).await;
                    inner.flush();
                });
                *lock(&self.inner.timer) = Some(task.abort_handle());
            }
            Err(_) => {
                tracing::trace!("no tokio runtime; delivering without batching");
                self.inner.flush();
            }
        }
    }

    /// Deliver the pending state now, if any.
    pub fn flush(&self) {
        if let Some(timer) = lock(&self.inner.timer).take() {
            timer.abort();
        }
        self.inner.flush();
    }

    /// Drop the pending state and stop delivering. Idempotent.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        if let Some(timer) = lock(&self.inner.timer).take() {
            timer.abort();
        }
        lock(&self.inner.pending).take();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Whether a state is waiting for the tick.
    pub fn has_pending(&self) -> bool {
        lock(&self.inner.pending).is_some()
    }

    /// Number of deliveries so far.
    pub fn deliveries(&self) -> usize {
        self.inner.deliveries.load(Ordering::SeqCst)
    }

    pub fn tick(&self) -> Duration {
        self.inner.tick
    }
}

impl fmt::Debug for NotificationBatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBatcher")
            .field("tick", &self.inner.tick)
            .field("closed", &self.is_closed())
            .field("deliveries", &self.deliveries())
            .finish()
    }
}

//! Effects: side-effect functions wrapped as four-phase event streams
//!
//! Calling an [`EffectCreator`] returns an [`EffectRun`], a stream that yields
//! exactly:
//!
//! 1. `start` with the call payload,
//! 2. `success(result)` or `fail(error)`,
//! 3. a completion marker whose type embeds a per-call id.
//!
//! The order holds for every call, however many calls are in flight, because
//! each call gets a fresh id.
//!
//! # Example
//!
//! ```
//! use epicstore_core::effect::EffectCreator;
//! use futures::StreamExt;
//! use serde_json::json;
//!
//! let double = EffectCreator::new("Double")
//!     .use_sync(|payload| Ok::<_, String>(payload.as_i64().unwrap_or(0) * 2));
//!
//! let events: Vec<_> = futures::executor::block_on(double.call(json!(21)).unwrap().collect());
//! assert!(double.start.is(&events[0]));
//! assert_eq!(events[1].payload(), &json!(42));
//! ```

use std::any::Any;
use std::fmt::{self, Display};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};

use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};

use crate::event::{unique_id, Event, EventCreator, EventType, IntoEventTypes};
use crate::StoreError;

/// Meta key on `start` events holding the call's completion marker type.
pub const COMPLETE_META_KEY: &str = "complete";

/// Outcome of an effect function: `Ok(result)` or `Err(error)` as JSON.
pub type EffectOutcome = Result<Value, Value>;

/// The type-erased effect function.
pub type EffectFn = Arc<dyn Fn(Value) -> BoxFuture<'static, EffectOutcome> + Send + Sync>;

/// Decides whether a call runs at all.
pub type Condition = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

struct EffectInner {
    description: String,
    function: RwLock<Option<EffectFn>>,
    condition: RwLock<Option<Condition>>,
}

/// An effect creator.
///
/// Cloning yields a handle to the same effect; swapping its function through
/// any handle affects all of them.
#[derive(Clone)]
pub struct EffectCreator {
    /// Emitted first on every call. Payload: the call payload.
    pub start: EventCreator,
    /// Emitted with the function's result.
    pub success: EventCreator,
    /// Emitted with the function's error.
    pub fail: EventCreator,
    inner: Arc<EffectInner>,
}

impl EffectCreator {
    /// Create an effect with no function yet.
    ///
    /// Calling it before [`use_fn`](Self::use_fn) or
    /// [`use_sync`](Self::use_sync) fails with
    /// [`StoreError::EffectNotProvided`].
    pub fn new(description: impl Into<String>) -> Self {
        let description = description.into();
        let start = EventCreator::new(format!("{}: START", description))
            .with_payload(|raw| raw["payload"].clone())
            .with_meta(|raw| json!({ COMPLETE_META_KEY: raw["id"] }));

        Self {
            success: EventCreator::new(format!("{}: SUCCESS", description)),
            fail: EventCreator::new(format!("{}: FAIL", description)),
            start,
            inner: Arc::new(EffectInner {
                description,
                function: RwLock::new(None),
                condition: RwLock::new(None),
            }),
        }
    }

    /// Install an async function, replacing the previous one.
    ///
    /// In-flight calls keep the function they started with.
    pub fn use_fn<F, Fut, T, E>(&self, function: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize + 'static,
        E: Display + 'static,
    {
        let function: EffectFn = Arc::new(move |payload| {
            // A panic while building the future counts as a failed call.
            match catch_unwind(AssertUnwindSafe(|| function(payload))) {
                Ok(fut) => AssertUnwindSafe(fut)
                    .catch_unwind()
                    .map(|outcome| match outcome {
                        Ok(result) => into_outcome(result),
                        Err(panic) => Err(panic_value(panic)),
                    })
                    .boxed(),
                Err(panic) => future::ready(Err(panic_value(panic))).boxed(),
            }
        });
        self.install(function);
        self.clone()
    }

    /// Install a synchronous function; its return value counts as already resolved.
    pub fn use_sync<F, T, E>(&self, function: F) -> Self
    where
        F: Fn(Value) -> Result<T, E> + Send + Sync + 'static,
        T: Serialize + 'static,
        E: Display + 'static,
    {
        let function: EffectFn = Arc::new(move |payload| {
            let outcome = match catch_unwind(AssertUnwindSafe(|| function(payload))) {
                Ok(result) => into_outcome(result),
                Err(panic) => Err(panic_value(panic)),
            };
            future::ready(outcome).boxed()
        });
        self.install(function);
        self.clone()
    }

    /// Only run calls whose payload satisfies `condition`.
    ///
    /// Calls that fail the condition emit nothing, not even `start`.
    pub fn with_condition<F>(self, condition: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        *self
            .inner
            .condition
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(condition));
        self
    }

    /// Whether a function is installed.
    pub fn is_ready(&self) -> bool {
        self.inner
            .function
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Invoke the effect.
    pub fn call(&self, payload: impl Into<Value>) -> crate::Result<EffectRun> {
        let function = self
            .inner
            .function
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| StoreError::EffectNotProvided(self.inner.description.clone()))?;

        let payload = payload.into();
        let allowed = self
            .inner
            .condition
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(true, |condition| condition(&payload));
        if !allowed {
            return Ok(EffectRun::empty());
        }

        let id = format!(
            "{}: COMPLETE [{}]",
            self.inner.description,
            unique_id()
        );
        let start = self.start.call(json!({ "id": id, "payload": payload }));
        let success = self.success.clone();
        let fail = self.fail.clone();
        let complete = Event::trigger(id.as_str());

        let settled = stream::once(async move {
            match function(payload).await {
                Ok(result) => success.call(result),
                Err(error) => fail.call(error),
            }
        });

        let stream = stream::once(future::ready(start))
            .chain(settled)
            .chain(stream::once(future::ready(complete)))
            .boxed();

        Ok(EffectRun {
            completion: Some(EventType::from(id)),
            stream,
        })
    }

    pub fn get_type(&self) -> &EventType {
        self.start.get_type()
    }

    pub fn description(&self) -> &str {
        &self.inner.description
    }

    /// Whether `event` is this effect's `start` event.
    pub fn is(&self, event: &Event) -> bool {
        self.start.is(event)
    }

    /// The completion marker type announced by a `start` event.
    pub fn completion_of(start: &Event) -> Option<EventType> {
        start
            .meta()
            .get(COMPLETE_META_KEY)
            .and_then(Value::as_str)
            .map(EventType::from)
    }

    fn install(&self, function: EffectFn) {
        *self
            .inner
            .function
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(function);
    }
}

impl fmt::Debug for EffectCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectCreator")
            .field("description", &self.inner.description)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl From<&EffectCreator> for EventType {
    fn from(effect: &EffectCreator) -> Self {
        effect.get_type().clone()
    }
}

impl IntoEventTypes for &EffectCreator {
    fn into_event_types(self) -> Vec<EventType> {
        vec![EventType::from(self)]
    }
}

/// Shorthand for [`EffectCreator::new`] followed by [`EffectCreator::use_fn`].
pub fn create_effect<F, Fut, T, E>(description: impl Into<String>, function: F) -> EffectCreator
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Serialize + 'static,
    E: Display + 'static,
{
    EffectCreator::new(description).use_fn(function)
}

/// The event stream of one effect call.
///
/// Dropping it before it finishes drops the underlying future.
pub struct EffectRun {
    completion: Option<EventType>,
    stream: BoxStream<'static, Event>,
}

impl EffectRun {
    /// A run that emits nothing.
    pub fn empty() -> Self {
        Self {
            completion: None,
            stream: stream::empty().boxed(),
        }
    }

    /// The completion marker type of this call, if it runs at all.
    pub fn completion(&self) -> Option<&EventType> {
        self.completion.as_ref()
    }
}

impl Stream for EffectRun {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.stream.poll_next_unpin(cx)
    }
}

impl fmt::Debug for EffectRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRun")
            .field("completion", &self.completion)
            .finish()
    }
}

fn into_outcome<T: Serialize, E: Display>(result: Result<T, E>) -> EffectOutcome {
    match result {
        Ok(value) => serde_json::to_value(value).map_err(|e| Value::String(e.to_string())),
        Err(error) => Err(Value::String(error.to_string())),
    }
}

/// Render a caught panic as a `fail` payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

fn panic_value(panic: Box<dyn Any + Send>) -> Value {
    Value::String(panic_message(&*panic))
}

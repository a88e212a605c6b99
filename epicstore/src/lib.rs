//! epicstore: event-driven state management
//!
//! A single state tree owned by an [`App`], changed only by reducers
//! reacting to typed events. Side effects live in effects and epics, and
//! views read state through batched consumers.
//!
//! # Example
//!
//! ```
//! use epicstore::prelude::*;
//!
//! let add = EventCreator::new("Add item");
//! let items = Reducer::new(0u32).on(&add, |n: &u32, _, _| n + 1);
//! let price = create_effect("Price", |payload: serde_json::Value| async move {
//!     Ok::<_, String>(payload["qty"].as_u64().unwrap_or_default() * 3)
//! });
//!
//! let app = create_app("shop", [Module::new("cart")
//!     .reducer("items", items)
//!     .event("add", add)
//!     .effect("price", price)]).unwrap();
//!
//! app.api().trigger("add").unwrap();
//! assert_eq!(app.state().get::<u32>("items"), Some(&1));
//!
//! let mut mounted = Consumer::builder(&app)
//!     .map_state(|state| state.get::<u32>("items").copied())
//!     .render(|props: &ConsumerProps<Option<u32>, Api>| println!("{:?}", props.state))
//!     .mount();
//! mounted.unmount();
//! ```

// Re-export everything from core
pub use epicstore_core::*;

// Consumers
pub use epicstore_consumer::{
    batch, component, consumer, Component, Consumer, ConsumerBuilder, ConsumerConfig,
    ConsumerProps, MountedConsumer, NotificationBatcher, UnmountedConsumer,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use epicstore_core::prelude::*;

    // Consumers
    pub use epicstore_consumer::{Component, Consumer, ConsumerConfig, ConsumerProps};
}

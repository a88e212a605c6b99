//! Consumers for epicstore apps
//!
//! Binds views to an [`App`](epicstore_core::App): state selection with
//! equality skipping, api props built once, and notifications coalesced
//! per tick so a burst of dispatches renders once.
//!
//! # Example
//!
//! ```
//! use epicstore_core::{create_app, Api, EventCreator, Module, Reducer};
//! use epicstore_consumer::{Consumer, ConsumerProps};
//!
//! let add = EventCreator::new("Add");
//! let app = create_app("shop", [Module::new("cart")
//!     .reducer("items", Reducer::new(0u32).on(&add, |n: &u32, _, _| n + 1))]).unwrap();
//!
//! let mut mounted = Consumer::builder(&app)
//!     .map_state(|state| state.get::<u32>("items").copied().unwrap_or_default())
//!     .render(|props: &ConsumerProps<u32, Api>| println!("items: {}", props.state))
//!     .mount();
//!
//! app.dispatch(add.trigger()).unwrap();
//! mounted.unmount();
//! assert!(mounted.subscription().is_closed());
//! ```

pub mod batch;
pub mod component;
pub mod consumer;

pub use batch::{NotificationBatcher, DEFAULT_TICK};
pub use component::Component;
pub use consumer::{
    Consumer, ConsumerBuilder, ConsumerConfig, ConsumerProps, MapApi, MapState, MergeProps,
    MountedConsumer, UnmountedConsumer,
};

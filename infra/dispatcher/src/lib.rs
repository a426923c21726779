//! # Dispatcher
//!
//! An in-process, type-generic publish/subscribe dispatcher.
//!
//! ## Overview
//!
//! A [`Dispatcher<T>`] keeps an ordered registry of handlers for one payload type
//! and delivers every dispatched value to them, without publishers and subscribers
//! knowing about each other. One dispatcher is one channel; there is no topic routing.
//!
//! ## Delivery modes
//!
//! * **Inline** ([`Dispatcher::subscribe`]): runs on the dispatching thread, in
//!   registration order, while the dispatcher's lock is held.
//! * **Once** ([`Dispatcher::subscribe_once`]): removed right before its first delivery.
//! * **Async** ([`Dispatcher::subscribe_async`]): runs on its own task via the
//!   dispatcher's [`Executor`]. Detached handlers are only awaited by
//!   [`Dispatcher::wait`]; transactional ones are awaited by the dispatch itself before
//!   it moves on, so they keep their place in the order.
//! * **Once + async** ([`Dispatcher::subscribe_once_async`]).
//!
//! Every subscribe call returns a [`Subscription`] bound to that handler's identity.
//!
//! # Example
//!
//! ```rust
//! use herald_dispatcher::{Dispatcher, DispatcherError};
//!
//! fn main() -> Result<(), DispatcherError> {
//!     let dispatcher = Dispatcher::<String>::builder().name("greetings").build();
//!
//!     let first = dispatcher.subscribe(|msg| tracing::info!(%msg, "Subscriber 1"));
//!     dispatcher.subscribe(|msg| tracing::info!(%msg, "Subscriber 2"));
//!     dispatcher.subscribe_once(|msg| tracing::info!(%msg, "Subscriber 3"));
//!
//!     assert_eq!(dispatcher.dispatch("Hello".to_owned())?, 3);
//!
//!     first.unsubscribe();
//!     assert_eq!(dispatcher.dispatch("World".to_owned())?, 1);
//!
//!     dispatcher.wait();
//!     Ok(())
//! }
//! ```

mod completion;
mod dispatcher;
mod error;
mod executor;
mod handler;
mod subscription;

pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::{DispatcherError, DispatcherErrorExt};
pub use executor::Executor;
pub use handler::{Delivery, HandlerId, Payload, SubscribeOptions};
pub use subscription::Subscription;

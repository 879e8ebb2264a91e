//! # typehub
//!
//! An in-process, type-keyed publish/subscribe hub.
//!
//! ## Core Concepts
//!
//! - **Hub**: One independent universe of subscriptions plus a global handler
//! - **Subscriptions**: Handlers registered for an exact message type, each
//!   identified by a [`Token`]
//! - **Snapshots**: Immutable, revision-tagged subscriber lists that publishers
//!   read without taking a lock
//! - **Global handler**: A single audit callback that sees every message
//!
//! Publishing is synchronous: the global handler and then every subscriber run
//! on the caller's thread before `publish` returns. Subscriber failures are
//! collected and returned together; a global handler failure stops the call.
//!
//! ## Example
//!
//! ```ignore
//! use typehub::{Hub, PublishError};
//!
//! let hub = Hub::create();
//!
//! hub.register_global_handler(|ty, _msg| {
//!     println!("audit: {ty}");
//!     Ok(())
//! });
//!
//! let token = hub.subscribe(|msg: &String| {
//!     println!("got {msg}");
//!     Ok(())
//! });
//!
//! match hub.publish("hello".to_string()) {
//!     Ok(()) => {}
//!     Err(PublishError::Subscribers(failures)) => {
//!         for failure in &failures {
//!             eprintln!("{}: {}", failure.token, failure.source);
//!         }
//!     }
//!     Err(err) => return Err(err.into()),
//! }
//!
//! hub.unsubscribe::<String>(token);
//! ```

pub mod channel;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod registry;
pub mod types;

// Re-exports
pub use channel::ChannelSubscription;
pub use dispatch::{Dispatcher, GlobalHandler};
pub use error::{
    AggregateFailure, ChannelError, HandlerError, PublishError, Result, SubscriberInvocationError,
    SubscriberPanicked,
};
pub use hub::{Hub, HubConfig};
pub use registry::{Handler, Snapshot, SnapshotCache, SnapshotEntry, TypeRegistry};
pub use types::*;

//! Per-type subscription storage.
//!
//! Each message type used on a hub gets one [`TypeRegistry`]:
//! - A token-keyed map of handlers, mutated under a lock
//! - A revision counter bumped on every subscribe/unsubscribe
//! - A [`SnapshotCache`] holding the last materialized subscriber list
//!
//! Publishers never take the lock when nothing changed since the cached
//! snapshot was built: they compare revisions with one atomic load and reuse
//! the cached `Arc<Snapshot<T>>`. A changed revision triggers a rebuild under
//! the lock, and the new snapshot is published with an atomic pointer swap.
//!
//! # Example
//!
//! ```ignore
//! let registry = TypeRegistry::<String>::new();
//! let token = registry.subscribe(Arc::new(|msg: &String| {
//!     println!("got {msg}");
//!     Ok(())
//! }));
//!
//! for entry in registry.current_snapshot().iter() {
//!     (entry.handler)(&"hello".to_string())?;
//! }
//!
//! registry.unsubscribe(token);
//! ```

mod snapshot;
mod type_registry;

pub use snapshot::{Snapshot, SnapshotCache, SnapshotEntry};
pub use type_registry::{Handler, TypeRegistry};

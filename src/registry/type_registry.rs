//! Subscription set for a single message type.

use crate::error::HandlerError;
use crate::types::{MessageType, Token};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::snapshot::{Snapshot, SnapshotCache, SnapshotEntry};

/// A subscriber callback for messages of type `T`.
pub type Handler<T> = Arc<dyn Fn(&T) -> std::result::Result<(), HandlerError> + Send + Sync>;

/// Active subscriptions for one message type.
///
/// Invariants:
/// - `revision` strictly increases on every subscribe and unsubscribe.
/// - The map reflects exactly the active subscriptions once a mutation
///   returns.
/// - Iteration order is subscription order.
pub struct TypeRegistry<T> {
    message_type: MessageType,
    /// Active handlers by token, in subscription order.
    subscriptions: Mutex<IndexMap<Token, Handler<T>>>,
    /// Bumped under the `subscriptions` lock, read without it.
    revision: AtomicU64,
    /// Last snapshot handed to publishers.
    cache: SnapshotCache<T>,
}

impl<T: 'static> TypeRegistry<T> {
    /// Create an empty registry at revision 0.
    pub fn new() -> Self {
        Self {
            message_type: MessageType::of::<T>(),
            subscriptions: Mutex::new(IndexMap::new()),
            revision: AtomicU64::new(0),
            cache: SnapshotCache::new(),
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Register a handler and return its fresh token.
    pub fn subscribe(&self, handler: Handler<T>) -> Token {
        let token = Token::new();

        let mut subs = self.subscriptions.lock();
        subs.insert(token, handler);
        self.revision.fetch_add(1, Ordering::AcqRel);

        token
    }

    /// Remove a subscription.
    ///
    /// The revision is bumped even when the token is unknown. Returns whether
    /// an entry was removed.
    pub fn unsubscribe(&self, token: Token) -> bool {
        let mut subs = self.subscriptions.lock();
        let removed = subs.shift_remove(&token).is_some();
        self.revision.fetch_add(1, Ordering::AcqRel);

        removed
    }

    /// Current revision. Lock-free.
    pub fn current_revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Materialize the active subscriptions together with their revision.
    pub fn snapshot(&self) -> Snapshot<T> {
        let subs = self.subscriptions.lock();
        // Mutations bump the revision while holding the lock, so this read
        // matches the map contents exactly.
        let revision = self.revision.load(Ordering::Acquire);

        let entries = subs
            .iter()
            .map(|(token, handler)| SnapshotEntry {
                token: *token,
                handler: Arc::clone(handler),
            })
            .collect();

        Snapshot::new(revision, entries)
    }

    /// The cached snapshot, rebuilt first if it is stale.
    pub fn current_snapshot(&self) -> Arc<Snapshot<T>> {
        self.cache.get_current(self)
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, token: Token) -> bool {
        self.subscriptions.lock().contains_key(&token)
    }
}

impl<T: 'static> Default for TypeRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

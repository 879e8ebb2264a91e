//! Immutable subscriber snapshots and the cache publishers read them from.

use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::types::Token;

use super::type_registry::{Handler, TypeRegistry};

/// One subscriber captured in a snapshot.
pub struct SnapshotEntry<T> {
    pub token: Token,
    pub handler: Handler<T>,
}

impl<T> Clone for SnapshotEntry<T> {
    fn clone(&self) -> Self {
        Self {
            token: self.token,
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<T> fmt::Debug for SnapshotEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotEntry")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Point-in-time copy of a registry's subscribers.
///
/// Never mutated after construction, so a publisher can iterate it while other
/// threads (or the handlers themselves) subscribe and unsubscribe.
pub struct Snapshot<T> {
    revision: u64,
    entries: Vec<SnapshotEntry<T>>,
}

impl<T> Snapshot<T> {
    pub(crate) fn new(revision: u64, entries: Vec<SnapshotEntry<T>>) -> Self {
        Self { revision, entries }
    }

    /// Snapshot of a registry nobody has touched yet.
    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    /// Registry revision this snapshot was built from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn entries(&self) -> &[SnapshotEntry<T>] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SnapshotEntry<T>> {
        self.entries.iter()
    }

    pub fn tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.entries.iter().map(|e| e.token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("revision", &self.revision)
            .field("entries", &self.entries)
            .finish()
    }
}

impl<'a, T> IntoIterator for &'a Snapshot<T> {
    type Item = &'a SnapshotEntry<T>;
    type IntoIter = std::slice::Iter<'a, SnapshotEntry<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Revision-tagged snapshot cache.
///
/// `get_current` costs one atomic revision read and one pointer load while the
/// registry is unchanged. On a revision mismatch the snapshot is rebuilt under
/// the registry lock and swapped in. A publisher may therefore miss a
/// subscribe/unsubscribe that completes concurrently with its check, but never
/// sees a revision older than one it already observed through this cache.
pub struct SnapshotCache<T> {
    slot: ArcSwap<Snapshot<T>>,
}

impl<T: 'static> SnapshotCache<T> {
    pub fn new() -> Self {
        Self {
            slot: ArcSwap::from_pointee(Snapshot::empty()),
        }
    }

    /// Return the cached snapshot if it matches `registry`'s revision,
    /// otherwise rebuild and cache a fresh one.
    pub fn get_current(&self, registry: &TypeRegistry<T>) -> Arc<Snapshot<T>> {
        let cached = self.slot.load_full();
        let current = registry.current_revision();
        if cached.revision == current {
            return cached;
        }

        let fresh = Arc::new(registry.snapshot());
        trace!(
            message_type = %registry.message_type(),
            from = cached.revision,
            to = fresh.revision,
            subscribers = fresh.len(),
            "rebuilt subscriber snapshot"
        );

        // Only replaces the snapshot we validated; a concurrent rebuild that
        // landed first is kept and re-validated on the next call.
        let _ = self.slot.compare_and_swap(&cached, Arc::clone(&fresh));

        fresh
    }

    /// Revision of the snapshot currently held.
    pub fn cached_revision(&self) -> u64 {
        self.slot.load().revision
    }
}

impl<T: 'static> Default for SnapshotCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

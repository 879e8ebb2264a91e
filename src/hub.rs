//! The hub: one independent publish/subscribe universe.

use arc_swap::ArcSwapOption;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::dispatch::{Dispatcher, GlobalHandler};
use crate::error::{HandlerError, Result};
use crate::registry::TypeRegistry;
use crate::types::{MessageType, Token};

/// Hub configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Name attached to this hub's log events.
    /// Default: "hub"
    pub label: String,

    /// Turn subscriber panics into aggregated failures instead of unwinding
    /// through `publish`. Global handler panics always unwind.
    /// Default: true
    pub catch_subscriber_panics: bool,

    /// Initial capacity of the message-type map.
    /// Default: 16
    pub initial_type_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            label: "hub".to_string(),
            catch_subscriber_panics: true,
            initial_type_capacity: 16,
        }
    }
}

/// An in-process, type-keyed publish/subscribe hub.
///
/// Subscribers register for an exact message type `T` and are invoked
/// synchronously on the publishing thread. An optional global handler sees
/// every message before any subscriber does.
///
/// Hubs share nothing: every instance has its own registries and its own
/// global handler slot. Wrap a hub in an `Arc` to share it across threads.
pub struct Hub {
    config: HubConfig,

    /// One `TypeRegistry<T>` per message type, keyed by `TypeId::of::<T>()`, so
    /// an entry always downcasts to the registry of its key's type.
    /// Entries are created on first use and never removed.
    registries: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,

    /// Replaced wholesale by `register_global_handler`.
    global: ArcSwapOption<GlobalHandler>,

    dispatcher: Dispatcher,
}

impl Hub {
    /// Create a hub with the default configuration.
    pub fn create() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a hub with an explicit configuration.
    pub fn with_config(config: HubConfig) -> Self {
        debug!(hub = %config.label, "created hub");

        Self {
            registries: RwLock::new(HashMap::with_capacity(config.initial_type_capacity)),
            global: ArcSwapOption::empty(),
            dispatcher: Dispatcher::new(config.label.as_str(), config.catch_subscriber_panics),
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    // --- Subscriptions ---

    /// Subscribe `handler` to messages of exactly type `T`.
    ///
    /// Subscribing the same handler twice yields two tokens and two
    /// invocations per publish.
    pub fn subscribe<T, F>(&self, handler: F) -> Token
    where
        T: 'static,
        F: Fn(&T) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
    {
        let registry = self.registry::<T>();
        let token = registry.subscribe(Arc::new(handler));

        debug!(
            hub = %self.config.label,
            message_type = %registry.message_type(),
            token = %token,
            revision = registry.current_revision(),
            "subscribed"
        );

        token
    }

    /// Remove the subscription `token` from type `T`.
    ///
    /// Unknown tokens, including tokens issued for another type, are ignored.
    pub fn unsubscribe<T: 'static>(&self, token: Token) {
        let Some(registry) = self.lookup::<T>() else {
            debug!(
                hub = %self.config.label,
                message_type = %MessageType::of::<T>(),
                token = %token,
                "unsubscribe for unused message type ignored"
            );
            return;
        };

        let removed = registry.unsubscribe(token);
        debug!(
            hub = %self.config.label,
            message_type = %registry.message_type(),
            token = %token,
            removed,
            revision = registry.current_revision(),
            "unsubscribed"
        );
    }

    // --- Publishing ---

    /// Publish `message` to the global handler and every subscriber of `T`.
    ///
    /// Returns [`PublishError::GlobalHandler`](crate::PublishError::GlobalHandler)
    /// as soon as the global handler fails, without invoking subscribers.
    /// Otherwise every subscriber is attempted and any failures come back
    /// together as [`PublishError::Subscribers`](crate::PublishError::Subscribers).
    pub fn publish<T: 'static>(&self, message: T) -> Result<()> {
        self.dispatcher
            .publish(self.global.load_full(), || self.registry::<T>(), &message)
    }

    // --- Global handler ---

    /// Install `handler` as the global handler, replacing any previous one.
    ///
    /// Takes effect from the next publish; a publish already past its global
    /// step keeps the handler it read.
    pub fn register_global_handler<F>(&self, handler: F)
    where
        F: Fn(MessageType, &dyn Any) -> std::result::Result<(), HandlerError>
            + Send
            + Sync
            + 'static,
    {
        let previous = self.global.swap(Some(Arc::new(GlobalHandler::new(handler))));
        debug!(
            hub = %self.config.label,
            replaced = previous.is_some(),
            "registered global handler"
        );
    }

    /// Empty the global handler slot.
    pub fn clear_global_handler(&self) {
        if self.global.swap(None).is_some() {
            debug!(hub = %self.config.label, "cleared global handler");
        }
    }

    pub fn has_global_handler(&self) -> bool {
        self.global.load().is_some()
    }

    // --- Introspection ---

    /// Number of active subscriptions for `T`.
    pub fn subscription_count<T: 'static>(&self) -> usize {
        self.lookup::<T>().map_or(0, |registry| registry.len())
    }

    /// Revision of `T`'s registry, or 0 if `T` was never used on this hub.
    pub fn revision<T: 'static>(&self) -> u64 {
        self.lookup::<T>()
            .map_or(0, |registry| registry.current_revision())
    }

    /// Number of message types with a registry on this hub.
    pub fn message_type_count(&self) -> usize {
        self.registries.read().len()
    }

    // --- Registry lookup ---

    fn lookup<T: 'static>(&self) -> Option<Arc<TypeRegistry<T>>> {
        self.registries
            .read()
            .get(&TypeId::of::<T>())
            .and_then(downcast_registry)
    }

    /// The registry for `T`, created on first use.
    pub(crate) fn registry<T: 'static>(&self) -> Arc<TypeRegistry<T>> {
        if let Some(registry) = self.lookup::<T>() {
            return registry;
        }

        let mut registries = self.registries.write();
        // Another thread may have created it between the two locks.
        if let Some(registry) = registries
            .get(&TypeId::of::<T>())
            .and_then(downcast_registry)
        {
            return registry;
        }

        let registry = Arc::new(TypeRegistry::<T>::new());
        let entry: Arc<dyn Any + Send + Sync> = registry.clone();
        registries.insert(TypeId::of::<T>(), entry);
        trace!(
            hub = %self.config.label,
            message_type = %registry.message_type(),
            "created type registry"
        );

        registry
    }
}

fn downcast_registry<T: 'static>(
    entry: &Arc<dyn Any + Send + Sync>,
) -> Option<Arc<TypeRegistry<T>>> {
    Arc::clone(entry).downcast::<TypeRegistry<T>>().ok()
}

impl Default for Hub {
    fn default() -> Self {
        Self::create()
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("label", &self.config.label)
            .field("message_types", &self.message_type_count())
            .field("has_global_handler", &self.has_global_handler())
            .finish()
    }
}

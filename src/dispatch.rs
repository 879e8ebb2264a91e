//! The publish path: global handler, snapshot lookup, fan-out, error collection.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

use crate::error::{
    AggregateFailure, HandlerError, PublishError, Result, SubscriberInvocationError,
    SubscriberPanicked,
};
use crate::registry::{Snapshot, SnapshotEntry, TypeRegistry};
use crate::types::MessageType;

/// The single audit callback a hub runs ahead of every publish.
pub struct GlobalHandler {
    handler: Box<
        dyn Fn(MessageType, &dyn Any) -> std::result::Result<(), HandlerError> + Send + Sync,
    >,
}

impl GlobalHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(MessageType, &dyn Any) -> std::result::Result<(), HandlerError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Box::new(handler),
        }
    }

    pub fn call(
        &self,
        message_type: MessageType,
        message: &dyn Any,
    ) -> std::result::Result<(), HandlerError> {
        (self.handler)(message_type, message)
    }
}

impl fmt::Debug for GlobalHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalHandler").finish_non_exhaustive()
    }
}

/// Runs one publish call.
///
/// Order within a call:
/// 1. The global handler, if any. Its failure is returned unwrapped and no
///    subscriber runs.
/// 2. Every subscriber in the current snapshot, in snapshot order. Failures
///    are collected and do not stop the fan-out.
/// 3. A non-empty failure list becomes [`PublishError::Subscribers`].
///
/// No lock is held while handlers run; handlers may re-enter the hub.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    label: Arc<str>,
    catch_subscriber_panics: bool,
}

impl Dispatcher {
    pub fn new(label: impl Into<Arc<str>>, catch_subscriber_panics: bool) -> Self {
        Self {
            label: label.into(),
            catch_subscriber_panics,
        }
    }

    /// Publish `message` through `global` and the registry `registry` resolves.
    ///
    /// `registry` is only called once the global handler has succeeded.
    pub fn publish<T, R>(
        &self,
        global: Option<Arc<GlobalHandler>>,
        registry: R,
        message: &T,
    ) -> Result<()>
    where
        T: 'static,
        R: FnOnce() -> Arc<TypeRegistry<T>>,
    {
        let message_type = MessageType::of::<T>();

        if let Some(global) = global {
            self.notify_global(&global, message_type, message)?;
        }

        let snapshot = registry().current_snapshot();
        self.fan_out(&snapshot, message_type, message)
    }

    fn notify_global<T: 'static>(
        &self,
        global: &GlobalHandler,
        message_type: MessageType,
        message: &T,
    ) -> Result<()> {
        global.call(message_type, message).map_err(|err| {
            warn!(
                hub = %self.label,
                message_type = %message_type,
                error = %err,
                "global handler failed, skipping subscribers"
            );
            PublishError::GlobalHandler(err)
        })
    }

    /// Invoke every subscriber in `snapshot` and aggregate their failures.
    pub fn fan_out<T>(
        &self,
        snapshot: &Snapshot<T>,
        message_type: MessageType,
        message: &T,
    ) -> Result<()> {
        let mut errors: Vec<SubscriberInvocationError> = Vec::new();

        for entry in snapshot {
            if let Err(err) = self.invoke(entry, message) {
                warn!(
                    hub = %self.label,
                    message_type = %message_type,
                    token = %entry.token,
                    error = %err,
                    "subscriber failed"
                );
                errors.push(SubscriberInvocationError::new(entry.token, err));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AggregateFailure::new(errors).into())
        }
    }

    fn invoke<T>(
        &self,
        entry: &SnapshotEntry<T>,
        message: &T,
    ) -> std::result::Result<(), HandlerError> {
        if !self.catch_subscriber_panics {
            return (entry.handler)(message);
        }

        match panic::catch_unwind(AssertUnwindSafe(|| (entry.handler)(message))) {
            Ok(result) => result,
            Err(payload) => Err(Box::new(SubscriberPanicked {
                message: panic_message(payload.as_ref()),
            })),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

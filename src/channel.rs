//! Channel-backed subscriptions.
//!
//! A channel subscription forwards a clone of every published message into a
//! bounded channel, so a consumer can drain messages on its own thread instead
//! of running inside the publisher's call.

use crossbeam_channel::{bounded, Receiver, RecvError, RecvTimeoutError, TryRecvError, TrySendError};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

use crate::error::{ChannelError, HandlerError};
use crate::hub::Hub;
use crate::registry::TypeRegistry;
use crate::types::Token;

/// Handle to a channel subscription.
///
/// Dropping the handle unsubscribes its token. A publish that already took its
/// subscriber snapshot may still report [`ChannelError::Disconnected`] once.
pub struct ChannelSubscription<T: 'static> {
    token: Token,
    receiver: Receiver<T>,
    registry: Weak<TypeRegistry<T>>,
}

impl<T: 'static> ChannelSubscription<T> {
    pub fn token(&self) -> Token {
        self.token
    }

    /// Receive the next message (blocking).
    pub fn recv(&self) -> Result<T, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message (non-blocking).
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    pub fn receiver(&self) -> &Receiver<T> {
        &self.receiver
    }
}

impl<T: 'static> Drop for ChannelSubscription<T> {
    fn drop(&mut self) {
        // The hub may already be gone.
        let Some(registry) = self.registry.upgrade() else {
            return;
        };

        let removed = registry.unsubscribe(self.token);
        debug!(
            message_type = %registry.message_type(),
            token = %self.token,
            removed,
            "channel subscription dropped"
        );
    }
}

impl Hub {
    /// Subscribe a bounded channel to messages of type `T`.
    ///
    /// A full channel fails that subscriber for the publish call with
    /// [`ChannelError::Full`]; the message is not buffered. A capacity of 0 is
    /// raised to 1.
    pub fn subscribe_channel<T>(&self, capacity: usize) -> ChannelSubscription<T>
    where
        T: Clone + Send + 'static,
    {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);

        let registry = self.registry::<T>();
        let token = self.subscribe(move |message: &T| -> Result<(), HandlerError> {
            match sender.try_send(message.clone()) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => Err(Box::new(ChannelError::Full(capacity))),
                Err(TrySendError::Disconnected(_)) => Err(Box::new(ChannelError::Disconnected)),
            }
        });

        ChannelSubscription {
            token,
            receiver,
            registry: Arc::downgrade(&registry),
        }
    }
}

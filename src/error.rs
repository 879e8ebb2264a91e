//! Error types for the hub.

use crate::types::Token;
use thiserror::Error;

/// Failure returned by a subscriber or the global handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One subscriber failed while handling a published message.
#[derive(Debug, Error)]
#[error("Error calling subscriber {token}")]
pub struct SubscriberInvocationError {
    /// Token of the failing subscription.
    pub token: Token,

    /// What the subscriber returned (or the panic it raised).
    #[source]
    pub source: HandlerError,
}

impl SubscriberInvocationError {
    pub fn new(token: Token, source: HandlerError) -> Self {
        Self { token, source }
    }

    /// The underlying handler error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

/// Every subscriber failure collected during a single publish call.
///
/// Entries keep the order in which subscribers were invoked.
#[derive(Debug, Error)]
#[error("{} subscriber(s) failed", .errors.len())]
pub struct AggregateFailure {
    errors: Vec<SubscriberInvocationError>,
}

impl AggregateFailure {
    pub(crate) fn new(errors: Vec<SubscriberInvocationError>) -> Self {
        debug_assert!(!errors.is_empty());
        Self { errors }
    }

    pub fn errors(&self) -> &[SubscriberInvocationError] {
        &self.errors
    }

    /// Tokens of the failed subscribers, in invocation order.
    pub fn tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.errors.iter().map(|e| e.token)
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> Vec<SubscriberInvocationError> {
        self.errors
    }
}

impl IntoIterator for AggregateFailure {
    type Item = SubscriberInvocationError;
    type IntoIter = std::vec::IntoIter<SubscriberInvocationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a AggregateFailure {
    type Item = &'a SubscriberInvocationError;
    type IntoIter = std::slice::Iter<'a, SubscriberInvocationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// Recorded in place of a handler error when a subscriber panics.
#[derive(Debug, Error)]
#[error("Subscriber panicked: {message}")]
pub struct SubscriberPanicked {
    pub message: String,
}

/// Failures of channel-backed subscriptions.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel full (capacity {0})")]
    Full(usize),

    #[error("Channel receiver disconnected")]
    Disconnected,
}

/// Error returned by [`Hub::publish`](crate::Hub::publish).
#[derive(Debug, Error)]
pub enum PublishError {
    /// The global handler failed. Its error is passed through as-is and no
    /// subscriber was invoked for this call.
    #[error("Global handler failed: {0}")]
    GlobalHandler(#[source] HandlerError),

    /// One or more subscribers failed. All subscribers were attempted.
    #[error(transparent)]
    Subscribers(#[from] AggregateFailure),
}

impl PublishError {
    /// The aggregate subscriber failure, if that is what this is.
    pub fn as_aggregate(&self) -> Option<&AggregateFailure> {
        match self {
            PublishError::Subscribers(aggregate) => Some(aggregate),
            PublishError::GlobalHandler(_) => None,
        }
    }

    pub fn is_global_handler(&self) -> bool {
        matches!(self, PublishError::GlobalHandler(_))
    }
}

/// Result type for publish operations.
pub type Result<T> = std::result::Result<T, PublishError>;

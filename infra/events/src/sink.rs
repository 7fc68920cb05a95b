use crate::category::Category;
use crate::token::SubscriptionId;
use std::any::Any;
use std::fmt::{self, Debug};
use tracing::error;

/// Why a single delivery failed.
#[derive(Debug)]
pub enum FailureKind {
    /// The handler returned an error.
    Error(anyhow::Error),
    /// The handler panicked; carries the panic message when it was a string.
    Panic(String),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(err) => write!(f, "handler error: {err:#}"),
            Self::Panic(message) => write!(f, "handler panicked: {message}"),
        }
    }
}

impl FailureKind {
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&'static str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic payload>".to_owned());
        Self::Panic(message)
    }
}

/// One failed delivery, as seen by a [`FailureSink`].
#[derive(Debug)]
pub struct HandlerFailure {
    pub category: Category,
    pub subscription: SubscriptionId,
    pub kind: FailureKind,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} subscriber {}: {}", self.category, self.subscription, self.kind)
    }
}

/// Receives handler failures caught by the drain loop, and filter panics caught while
/// publishing.
///
/// Implementations must not panic; they run on the draining or publishing thread after the
/// failing callback has already been isolated.
pub trait FailureSink: Debug + Send + Sync {
    fn report(&self, failure: HandlerFailure);
}

/// Default sink: forwards every failure to `tracing` at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl FailureSink for TracingSink {
    fn report(&self, failure: HandlerFailure) {
        error!(
            category = %failure.category,
            subscription = failure.subscription.get(),
            "Event handler failed: {}",
            failure.kind
        );
    }
}

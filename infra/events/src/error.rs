use std::borrow::Cow;

/// Errors that can occur while registering with or configuring the event bus.
///
/// Runtime delivery problems never surface here: handler failures are routed to the
/// [`FailureSink`](crate::FailureSink) during a drain.
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    /// A category tag is already bound to a different event type.
    #[error("Category conflict{}: {message}", format_context(.context))]
    CategoryConflict { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The subscription group was disposed and no longer accepts subscriptions.
    #[error("Subscription group disposed{}: {message}", format_context(.context))]
    GroupDisposed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Invalid configuration supplied to the bus builder.
    #[error("Invalid event bus configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Adds human-readable context to a failed bus operation.
pub trait EventBusErrorExt<T> {
    /// Attaches `context` to the error, replacing any previous context.
    ///
    /// # Errors
    /// Returns the original error with its context field set.
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, EventBusError>;
}

impl<T> EventBusErrorExt<T> for Result<T, EventBusError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            match &mut e {
                EventBusError::CategoryConflict { context: c, .. }
                | EventBusError::GroupDisposed { context: c, .. }
                | EventBusError::InvalidConfiguration { context: c, .. } => {
                    *c = Some(context.into());
                },
            }
            e
        })
    }
}

fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_context() {
        let err = EventBusError::GroupDisposed { message: "ui".into(), context: None };
        assert_eq!(err.to_string(), "Subscription group disposed: ui");
    }

    #[test]
    fn test_context_is_attached() {
        let result: Result<(), EventBusError> = Err(EventBusError::CategoryConflict {
            message: "player.moved".into(),
            context: None,
        });

        let err = result.context("registering hud").unwrap_err();
        assert_eq!(err.to_string(), "Category conflict (registering hud): player.moved");
    }
}

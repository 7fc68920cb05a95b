use crate::bus::EventBus;
use crate::category::{Category, Event};
use crate::error::EventBusError;
use crate::token::SubscriptionToken;
use tracing::trace;

/// Owns a set of subscriptions and releases them together.
///
/// Intended for components that register many handlers and want to drop all of them at
/// teardown. Releasing happens on [`SubscriptionGroup::dispose`] or when the group is
/// dropped, whichever comes first.
///
/// Disposal is final: `dispose` may be called any number of times, but every `add` after
/// it fails with [`EventBusError::GroupDisposed`].
///
/// # Example
/// ```rust
/// use tickbus_events::{Category, Event, EventBus};
///
/// #[derive(Debug)]
/// struct Resized;
///
/// impl Event for Resized {
///     const CATEGORY: Category = Category::new("window.resized");
/// }
///
/// # fn main() -> Result<(), tickbus_events::EventBusError> {
/// let bus = EventBus::new();
/// {
///     let mut group = bus.group();
///     group.on(|_: &Resized| Ok(()))?;
///     group.add(|_: &Resized| Ok(()), 10)?;
///     assert_eq!(bus.subscriber_count(Resized::CATEGORY), 2);
/// }
/// assert_eq!(bus.subscriber_count(Resized::CATEGORY), 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
#[must_use = "dropping the group immediately releases its subscriptions"]
pub struct SubscriptionGroup {
    bus: EventBus,
    tokens: Vec<SubscriptionToken>,
    disposed: bool,
}

impl SubscriptionGroup {
    pub fn new(bus: &EventBus) -> Self {
        Self { bus: bus.clone(), tokens: Vec::new(), disposed: false }
    }

    /// Subscribes with priority `0` and keeps the token.
    ///
    /// # Errors
    /// See [`SubscriptionGroup::add`].
    pub fn on<E, H>(&mut self, handler: H) -> Result<SubscriptionToken, EventBusError>
    where
        E: Event,
        H: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.add(handler, 0)
    }

    /// Subscribes through the owning bus and keeps the token.
    ///
    /// # Errors
    /// Returns [`EventBusError::GroupDisposed`] after [`SubscriptionGroup::dispose`], or any
    /// error of [`EventBus::subscribe`].
    pub fn add<E, H>(&mut self, handler: H, priority: i32) -> Result<SubscriptionToken, EventBusError>
    where
        E: Event,
        H: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.ensure_live::<E>()?;
        let token = self.bus.subscribe(handler, priority)?;
        self.tokens.push(token);
        Ok(token)
    }

    /// Filtered variant of [`SubscriptionGroup::add`].
    ///
    /// # Errors
    /// See [`SubscriptionGroup::add`].
    pub fn add_filtered<E, H, F>(
        &mut self,
        handler: H,
        priority: i32,
        filter: F,
    ) -> Result<SubscriptionToken, EventBusError>
    where
        E: Event,
        H: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.ensure_live::<E>()?;
        let token = self.bus.subscribe_filtered(handler, priority, filter)?;
        self.tokens.push(token);
        Ok(token)
    }

    /// Unsubscribes and forgets every token of `category`. Returns how many were released.
    pub fn remove_by_category(&mut self, category: Category) -> usize {
        let before = self.tokens.len();
        let bus = &self.bus;
        self.tokens.retain(|token| {
            if token.category() == category {
                bus.unsubscribe(*token);
                false
            } else {
                true
            }
        });
        before - self.tokens.len()
    }

    /// Typed shorthand for [`SubscriptionGroup::remove_by_category`].
    pub fn remove<E: Event>(&mut self) -> usize {
        self.remove_by_category(E::CATEGORY)
    }

    /// Unsubscribes everything and closes the group.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        let released = self.tokens.len();
        for token in self.tokens.drain(..) {
            self.bus.unsubscribe(token);
        }
        trace!(released, "Subscription group disposed");
    }

    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[must_use]
    pub fn tokens(&self) -> &[SubscriptionToken] {
        &self.tokens
    }

    fn ensure_live<E: Event>(&self) -> Result<(), EventBusError> {
        if self.disposed {
            return Err(EventBusError::GroupDisposed {
                message: format!("cannot subscribe to '{}'", E::CATEGORY).into(),
                context: None,
            });
        }
        Ok(())
    }
}

impl Drop for SubscriptionGroup {
    fn drop(&mut self) {
        self.dispose();
    }
}

//! Per-category subscription lists with lock striping.
//!
//! Every category owns one [`Stripe`]: its priority-ordered subscription list behind its own
//! mutex. The category map is only write-locked while a stripe is created, so publishers and
//! subscribers of unrelated categories never wait on each other.

use crate::category::{Category, Event};
use crate::error::EventBusError;
use crate::sink::{FailureKind, HandlerFailure};
use crate::token::{self, SubscriptionId, SubscriptionToken};
use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) type HandlerFn<E> = dyn Fn(&E) -> anyhow::Result<()> + Send + Sync;
pub(crate) type FilterFn<E> = dyn Fn(&E) -> bool + Send + Sync;

/// Category-erased delivery target.
pub(crate) trait ErasedHandler: Send + Sync {
    /// Delivers one event to the underlying typed handler.
    fn invoke(&self, event: &(dyn Any + Send + Sync)) -> anyhow::Result<()>;

    /// Evaluates the subscription filter; absent filters accept everything.
    fn accepts(&self, event: &(dyn Any + Send + Sync)) -> bool;
}

struct Typed<E: Event> {
    handler: Box<HandlerFn<E>>,
    filter: Option<Box<FilterFn<E>>>,
}

impl<E: Event> ErasedHandler for Typed<E> {
    fn invoke(&self, event: &(dyn Any + Send + Sync)) -> anyhow::Result<()> {
        let Some(event) = event.downcast_ref::<E>() else {
            anyhow::bail!("expected event of type {}", type_name::<E>());
        };
        (self.handler)(event)
    }

    fn accepts(&self, event: &(dyn Any + Send + Sync)) -> bool {
        event.downcast_ref::<E>().is_some_and(|e| self.filter.as_ref().is_none_or(|f| f(e)))
    }
}

/// A handler snapshot taken at publish time, detached from the registry.
#[derive(Clone)]
pub(crate) struct BoundHandler {
    token: SubscriptionToken,
    target: Arc<dyn ErasedHandler>,
}

impl BoundHandler {
    pub(crate) const fn id(&self) -> SubscriptionId {
        self.token.id()
    }

    pub(crate) const fn category(&self) -> Category {
        self.token.category()
    }

    pub(crate) fn invoke(&self, event: &(dyn Any + Send + Sync)) -> anyhow::Result<()> {
        self.target.invoke(event)
    }
}

/// Result of matching one event against a category's subscriptions.
#[derive(Default)]
pub(crate) struct Snapshot {
    pub(crate) handlers: Vec<BoundHandler>,
    /// Filters that panicked while being evaluated.
    pub(crate) failures: Vec<HandlerFailure>,
}

struct Subscription {
    token: SubscriptionToken,
    priority: i32,
    target: Arc<dyn ErasedHandler>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("token", &self.token)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct Stripe {
    owner: TypeId,
    owner_name: &'static str,
    /// Sorted by descending priority; equal priorities keep insertion order.
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Stripe {
    fn new<E: Event>() -> Self {
        Self {
            owner: TypeId::of::<E>(),
            owner_name: type_name::<E>(),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    fn is_owned_by<E: Event>(&self) -> bool {
        self.owner == TypeId::of::<E>()
    }
}

/// Registry of all live subscriptions, keyed by category.
#[derive(Debug)]
pub(crate) struct Registry {
    stripes: RwLock<FxHashMap<Category, Arc<Stripe>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self { stripes: RwLock::new(FxHashMap::default()) }
    }

    pub(crate) fn subscribe<E: Event>(
        &self,
        handler: Box<HandlerFn<E>>,
        priority: i32,
        filter: Option<Box<FilterFn<E>>>,
    ) -> Result<SubscriptionToken, EventBusError> {
        let stripe = self.stripe_for::<E>()?;
        let token = token::issue(E::CATEGORY);
        let subscription =
            Subscription { token, priority, target: Arc::new(Typed::<E> { handler, filter }) };

        {
            let mut list = stripe.subscriptions.lock();
            let index = list.partition_point(|s| s.priority >= priority);
            list.insert(index, subscription);
        }

        debug!(category = %E::CATEGORY, id = token.id().get(), priority, "Subscribed");
        Ok(token)
    }

    /// Removes the subscription behind `token`. Returns whether anything was removed.
    pub(crate) fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let Some(stripe) = self.existing(token.category()) else {
            return false;
        };

        let removed = {
            let mut list = stripe.subscriptions.lock();
            let before = list.len();
            list.retain(|s| s.token.id() != token.id());
            before != list.len()
        };

        if removed {
            debug!(category = %token.category(), id = token.id().get(), "Unsubscribed");
        }
        removed
    }

    /// Handlers whose filter accepts `event`, in dispatch order.
    ///
    /// Never creates a stripe: publishing to a category nobody listens to leaves no trace. A
    /// filter that panics excludes its subscription and is returned as a failure instead.
    pub(crate) fn snapshot_matching<E: Event>(&self, event: &E) -> Snapshot {
        let mut snapshot = Snapshot::default();
        let Some(stripe) = self.existing(E::CATEGORY) else {
            return snapshot;
        };

        if !stripe.is_owned_by::<E>() {
            warn!(
                category = %E::CATEGORY,
                owner = stripe.owner_name,
                published = type_name::<E>(),
                "Event published under a category owned by another type; dropped"
            );
            return snapshot;
        }

        let event: &(dyn Any + Send + Sync) = event;
        let list = stripe.subscriptions.lock();
        for s in list.iter() {
            match panic::catch_unwind(AssertUnwindSafe(|| s.target.accepts(event))) {
                Ok(true) => snapshot
                    .handlers
                    .push(BoundHandler { token: s.token, target: Arc::clone(&s.target) }),
                Ok(false) => {},
                Err(payload) => snapshot.failures.push(HandlerFailure {
                    category: s.token.category(),
                    subscription: s.token.id(),
                    kind: FailureKind::from_panic(&*payload),
                }),
            }
        }
        snapshot
    }

    pub(crate) fn subscriber_count(&self, category: Category) -> usize {
        self.existing(category).map_or(0, |stripe| stripe.subscriptions.lock().len())
    }

    pub(crate) fn categories(&self) -> Vec<Category> {
        let mut categories: Vec<_> = self.stripes.read().keys().copied().collect();
        categories.sort_unstable();
        categories
    }

    fn existing(&self, category: Category) -> Option<Arc<Stripe>> {
        self.stripes.read().get(&category).cloned()
    }

    fn stripe_for<E: Event>(&self) -> Result<Arc<Stripe>, EventBusError> {
        let stripe = match self.existing(E::CATEGORY) {
            Some(stripe) => stripe,
            None => {
                let mut stripes = self.stripes.write();
                let stripe = stripes.entry(E::CATEGORY).or_insert_with(|| {
                    debug!(category = %E::CATEGORY, owner = type_name::<E>(), "Creating stripe");
                    Arc::new(Stripe::new::<E>())
                });
                Arc::clone(stripe)
            },
        };

        if stripe.is_owned_by::<E>() {
            Ok(stripe)
        } else {
            Err(EventBusError::CategoryConflict {
                message: format!(
                    "'{}' is owned by {}, not {}",
                    E::CATEGORY,
                    stripe.owner_name,
                    type_name::<E>()
                )
                .into(),
                context: None,
            })
        }
    }
}

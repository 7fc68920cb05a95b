use crate::category::{Category, Event};
use crate::clock::{Clock, MonotonicClock};
use crate::config::BusConfig;
use crate::error::EventBusError;
use crate::group::SubscriptionGroup;
use crate::queue::{DispatchQueue, DispatchTask};
use crate::registry::{FilterFn, HandlerFn, Registry, Snapshot};
use crate::sink::{FailureKind, FailureSink, HandlerFailure, TracingSink};
use crate::token::SubscriptionToken;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Outcome of a single [`EventBus::drain`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Tasks popped and handed to their handler, failed ones included.
    pub dispatched: usize,
    /// Tasks whose handler returned an error or panicked.
    pub failed: usize,
    /// Tasks whose handler ran longer than the slow-handler threshold.
    pub slow: usize,
    /// Tasks still queued when the pass ended.
    pub remaining: usize,
    /// Time spent in the pass according to the bus clock.
    pub elapsed: Duration,
    /// The budget ran out before the queue was emptied.
    pub exhausted: bool,
}

impl DrainReport {
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.dispatched == 0
    }
}

#[derive(Debug)]
struct EventBusInner {
    registry: Registry,
    queue: DispatchQueue,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn FailureSink>,
    config: BusConfig,
    draining: AtomicBool,
}

/// A deferred, priority-ordered publish/subscribe bus.
///
/// `publish` only matches subscriptions and enqueues deliveries; handlers run later, on the
/// thread that calls [`EventBus::drain`] or [`EventBus::tick`], bounded by a time budget.
///
/// The handle is reference-counted and cheap to clone across threads.
///
/// # Example
/// ```rust
/// use tickbus_events::{Category, Event, EventBus};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// #[derive(Debug)]
/// struct Damage(u32);
///
/// impl Event for Damage {
///     const CATEGORY: Category = Category::new("combat.damage");
/// }
///
/// # fn main() -> Result<(), tickbus_events::EventBusError> {
/// let bus = EventBus::new();
/// let total = Arc::new(AtomicU32::new(0));
///
/// let seen = Arc::clone(&total);
/// bus.on(move |d: &Damage| {
///     seen.fetch_add(d.0, Ordering::Relaxed);
///     Ok(())
/// })?;
///
/// assert_eq!(bus.publish(Damage(7)), 1);
/// assert_eq!(total.load(Ordering::Relaxed), 0, "nothing runs until the bus is drained");
///
/// bus.tick();
/// assert_eq!(total.load(Ordering::Relaxed), 7);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::from_parts(Arc::new(MonotonicClock::new()), Arc::new(TracingSink), BusConfig::default())
    }
}

impl EventBus {
    /// Creates a bus with a monotonic clock, the tracing failure sink and default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builders do nothing unless you call .build()"]
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::default()
    }

    fn from_parts(clock: Arc<dyn Clock>, sink: Arc<dyn FailureSink>, config: BusConfig) -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                registry: Registry::new(),
                queue: DispatchQueue::new(),
                clock,
                sink,
                config,
                draining: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribes `handler` to `E` with priority `0` and no filter.
    ///
    /// # Errors
    /// Returns [`EventBusError::CategoryConflict`] if another type already owns `E::CATEGORY`.
    pub fn on<E, H>(&self, handler: H) -> Result<SubscriptionToken, EventBusError>
    where
        E: Event,
        H: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register::<E>(Box::new(handler), 0, None)
    }

    /// Subscribes `handler` to `E`. Higher priorities are dispatched first within one publish.
    ///
    /// # Errors
    /// Returns [`EventBusError::CategoryConflict`] if another type already owns `E::CATEGORY`.
    pub fn subscribe<E, H>(
        &self,
        handler: H,
        priority: i32,
    ) -> Result<SubscriptionToken, EventBusError>
    where
        E: Event,
        H: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register::<E>(Box::new(handler), priority, None)
    }

    /// Subscribes `handler` to the events of type `E` for which `filter` returns `true`.
    ///
    /// The filter runs at publish time, on the publishing thread, while the category's
    /// stripe lock is held; keep it cheap and never publish or subscribe from inside it.
    ///
    /// # Errors
    /// Returns [`EventBusError::CategoryConflict`] if another type already owns `E::CATEGORY`.
    pub fn subscribe_filtered<E, H, F>(
        &self,
        handler: H,
        priority: i32,
        filter: F,
    ) -> Result<SubscriptionToken, EventBusError>
    where
        E: Event,
        H: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.register::<E>(Box::new(handler), priority, Some(Box::new(filter)))
    }

    fn register<E: Event>(
        &self,
        handler: Box<HandlerFn<E>>,
        priority: i32,
        filter: Option<Box<FilterFn<E>>>,
    ) -> Result<SubscriptionToken, EventBusError> {
        self.inner.registry.subscribe(handler, priority, filter)
    }

    /// Removes a subscription. Unknown or already removed tokens are ignored.
    ///
    /// Deliveries already enqueued for the subscription are still dispatched.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.inner.registry.unsubscribe(token)
    }

    /// Enqueues one delivery per matching subscription and returns how many were enqueued.
    pub fn publish<E: Event>(&self, event: E) -> usize {
        self.publish_arc(Arc::new(event))
    }

    /// Like [`EventBus::publish`], for an event that is already shared.
    pub fn publish_arc<E: Event>(&self, event: Arc<E>) -> usize {
        let Snapshot { handlers, failures } =
            self.inner.registry.snapshot_matching(event.as_ref());
        for failure in failures {
            self.inner.sink.report(failure);
        }
        if handlers.is_empty() {
            trace!(category = %E::CATEGORY, "Event dropped: no matching subscribers");
            return 0;
        }

        let count = handlers.len();
        let event: Arc<dyn Any + Send + Sync> = event;
        for handler in handlers {
            self.inner.queue.push(DispatchTask { event: Arc::clone(&event), handler });
        }

        trace!(category = %E::CATEGORY, count, "Event enqueued");
        count
    }

    /// Dispatches queued deliveries until the queue is empty or `budget` has elapsed.
    ///
    /// Handler errors and panics are reported to the failure sink and never stop the pass.
    /// The budget is checked between deliveries, so one slow handler can overrun it. Only
    /// one drain runs at a time; an overlapping or nested call returns an idle report.
    pub fn drain(&self, budget: Duration) -> DrainReport {
        let inner = &*self.inner;
        if inner.queue.is_empty() {
            return DrainReport::default();
        }

        if inner.draining.swap(true, Ordering::AcqRel) {
            warn!("Drain already in progress; nested or concurrent drain skipped");
            return DrainReport { remaining: inner.queue.len(), ..DrainReport::default() };
        }
        let _guard = DrainGuard(&inner.draining);

        let start = inner.clock.now();
        let slow = inner.config.slow_handler();
        let mut report = DrainReport::default();

        loop {
            if inner.clock.now().saturating_sub(start) >= budget {
                report.exhausted = !inner.queue.is_empty();
                break;
            }
            let Some(task) = inner.queue.pop() else {
                break;
            };

            let started = inner.clock.now();
            if let Err(kind) = dispatch(&task) {
                report.failed += 1;
                inner.sink.report(HandlerFailure {
                    category: task.category(),
                    subscription: task.handler.id(),
                    kind,
                });
            }
            report.dispatched += 1;

            let took = inner.clock.now().saturating_sub(started);
            if !slow.is_zero() && took > slow {
                report.slow += 1;
                warn!(
                    category = %task.category(),
                    subscription = task.handler.id().get(),
                    took_us = took.as_micros(),
                    "Slow event handler"
                );
            }
        }

        report.elapsed = inner.clock.now().saturating_sub(start);
        report.remaining = inner.queue.len();

        debug!(
            dispatched = report.dispatched,
            failed = report.failed,
            slow = report.slow,
            remaining = report.remaining,
            elapsed_us = report.elapsed.as_micros(),
            "Drain pass finished"
        );
        report
    }

    /// Drains with the configured budget. Call once per frame or timer tick.
    pub fn tick(&self) -> DrainReport {
        self.drain(self.inner.config.drain_budget())
    }

    /// Number of deliveries waiting for a drain.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.queue.len()
    }

    /// Number of live subscriptions for `category`.
    #[must_use]
    pub fn subscriber_count(&self, category: Category) -> usize {
        self.inner.registry.subscriber_count(category)
    }

    /// Every category that has ever been subscribed to, sorted by tag.
    #[must_use]
    pub fn categories(&self) -> Vec<Category> {
        self.inner.registry.categories()
    }

    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Creates an empty [`SubscriptionGroup`] bound to this bus.
    #[must_use]
    pub fn group(&self) -> SubscriptionGroup {
        SubscriptionGroup::new(self)
    }
}

fn dispatch(task: &DispatchTask) -> Result<(), FailureKind> {
    match panic::catch_unwind(AssertUnwindSafe(|| task.handler.invoke(&*task.event))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(FailureKind::Error(err)),
        Err(payload) => Err(FailureKind::from_panic(&*payload)),
    }
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A fluent builder for [`EventBus`].
#[derive(Debug, Default)]
pub struct EventBusBuilder {
    clock: Option<Arc<dyn Clock>>,
    sink: Option<Arc<dyn FailureSink>>,
    config: BusConfig,
}

impl EventBusBuilder {
    /// Time source for drain budgets. Defaults to [`MonotonicClock`].
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Receiver of handler failures. Defaults to [`TracingSink`].
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn drain_budget(mut self, budget: Duration) -> Self {
        self.config.drain_budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Validates the configuration and creates the bus.
    ///
    /// # Errors
    /// Returns [`EventBusError::InvalidConfiguration`] if the drain budget is zero.
    pub fn build(self) -> Result<EventBus, EventBusError> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));

        debug!(
            drain_budget_ms = self.config.drain_budget_ms,
            slow_handler_ms = self.config.slow_handler_ms,
            "Event bus created"
        );
        Ok(EventBus::from_parts(clock, sink, self.config))
    }
}

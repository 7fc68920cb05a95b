//! # Event Bus
//!
//! An in-process publish/subscribe bus that decouples components in space and in time.
//!
//! ## Overview
//!
//! Publishers never see subscribers, and handlers never run inside `publish`. Publishing
//! matches the event against its category's subscriptions and enqueues one delivery per
//! match; a driving loop later calls [`EventBus::tick`] once per frame (or timer tick) to
//! run queued deliveries within a fixed time budget.
//!
//! ## Features
//!
//! * **Explicit categories**: each [`Event`] type declares a stable [`Category`] tag.
//! * **Priorities and filters**: higher priorities run first within one publish; equal
//!   priorities keep subscription order. Optional filters are evaluated at publish time.
//! * **Lock striping**: one mutex per category (`parking_lot`), so unrelated categories never
//!   contend.
//! * **Lock-free dispatch queue**: `crossbeam_queue::SegQueue` between publishers and the drain
//!   loop.
//! * **Failure isolation**: handler errors and panics are reported to a [`FailureSink`] and
//!   never stop the drain pass.
//! * **Bulk release**: [`SubscriptionGroup`] drops many subscriptions at once.
//!
//! # Example
//!
//! ```rust
//! use tickbus_events::{Category, Event, EventBus, EventBusError};
//!
//! #[derive(Debug)]
//! struct UserCreated {
//!     id: u64,
//! }
//!
//! impl Event for UserCreated {
//!     const CATEGORY: Category = Category::new("user.created");
//! }
//!
//! fn main() -> Result<(), EventBusError> {
//!     let bus = EventBus::new();
//!
//!     let token = bus.subscribe_filtered(
//!         |e: &UserCreated| {
//!             assert_eq!(e.id, 42);
//!             Ok(())
//!         },
//!         10,
//!         |e: &UserCreated| e.id > 0,
//!     )?;
//!
//!     bus.publish(UserCreated { id: 42 });
//!     let report = bus.tick();
//!     assert_eq!(report.dispatched, 1);
//!
//!     bus.unsubscribe(token);
//!     Ok(())
//! }
//! ```

mod bus;
mod category;
mod clock;
mod config;
mod error;
mod group;
mod queue;
mod registry;
mod sink;
mod token;

pub use bus::{DrainReport, EventBus, EventBusBuilder};
pub use category::{Category, Event};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{BusConfig, DEFAULT_DRAIN_BUDGET};
pub use error::{EventBusError, EventBusErrorExt};
pub use group::SubscriptionGroup;
pub use sink::{FailureKind, FailureSink, HandlerFailure, TracingSink};
pub use token::{SubscriptionId, SubscriptionToken};

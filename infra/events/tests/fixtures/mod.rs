#![allow(dead_code, unreachable_pub)]

use parking_lot::Mutex;
use std::sync::Arc;
use tickbus_events::{Category, Event, FailureSink, HandlerFailure};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scored {
    pub value: u32,
}

impl Event for Scored {
    const CATEGORY: Category = Category::new("fixture.scored");
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spawned(pub u32);

impl Event for Spawned {
    const CATEGORY: Category = Category::new("fixture.spawned");
}

/// Shared, ordered log of handler invocations.
#[derive(Clone, Debug, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }
}

/// Failure sink that keeps every report for inspection.
#[derive(Debug, Default)]
pub struct CollectingSink(Mutex<Vec<HandlerFailure>>);

impl CollectingSink {
    pub fn count(&self) -> usize {
        self.0.lock().len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.0.lock().iter().map(ToString::to_string).collect()
    }
}

impl FailureSink for CollectingSink {
    fn report(&self, failure: HandlerFailure) {
        self.0.lock().push(failure);
    }
}

//! Events the ticker feeds through the bus.

use tickbus_events::{Category, Event};

/// Published by the loop itself once per tick, before draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub tick: u64,
}

impl Event for Heartbeat {
    const CATEGORY: Category = Category::new("ticker.heartbeat");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySpawned {
    pub publisher: usize,
    pub entity: usize,
}

impl Event for EntitySpawned {
    const CATEGORY: Category = Category::new("ticker.entity_spawned");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreChanged {
    pub publisher: usize,
    pub delta: i64,
}

impl Event for ScoreChanged {
    const CATEGORY: Category = Category::new("ticker.score_changed");
}

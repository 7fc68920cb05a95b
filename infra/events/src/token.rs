use crate::category::Category;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier of one subscription, across every bus in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Capability returned by `subscribe`, later presented to `unsubscribe`.
///
/// Tokens are never reused: every subscribe call yields a fresh id, even for an identical
/// category and handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    category: Category,
    id: SubscriptionId,
}

impl SubscriptionToken {
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Issues a token with a fresh id. Ids come from one process-wide counter, so a token from one
/// bus never matches a subscription of another.
pub(crate) fn issue(category: Category) -> SubscriptionToken {
    let id = SubscriptionId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
    SubscriptionToken { category, id }
}

use std::any::Any;
use std::fmt;

/// A stable tag that identifies a kind of event.
///
/// Categories are declared next to the event type through [`Event::CATEGORY`] and used as
/// the key for every per-category structure in the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category(&'static str);

impl Category {
    /// Creates a category from a static tag.
    #[must_use]
    pub const fn new(tag: &'static str) -> Self {
        Self(tag)
    }

    /// Returns the raw tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl From<&'static str> for Category {
    fn from(tag: &'static str) -> Self {
        Self(tag)
    }
}

/// A value that can be published on the [`EventBus`](crate::EventBus).
///
/// Each event type names its category explicitly; the first type to touch a category owns
/// it for the lifetime of the bus.
///
/// # Example
/// ```rust
/// use tickbus_events::{Category, Event};
///
/// #[derive(Debug)]
/// struct PlayerMoved {
///     x: i32,
///     y: i32,
/// }
///
/// impl Event for PlayerMoved {
///     const CATEGORY: Category = Category::new("player.moved");
/// }
/// ```
pub trait Event: Any + Send + Sync + 'static {
    /// The category every instance of this type is published under.
    const CATEGORY: Category;
}

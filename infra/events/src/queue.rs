use crate::category::Category;
use crate::registry::BoundHandler;
use crossbeam_queue::SegQueue;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// An event paired with the handler it must be delivered to, captured at publish time.
pub(crate) struct DispatchTask {
    pub(crate) event: Arc<dyn Any + Send + Sync>,
    pub(crate) handler: BoundHandler,
}

impl fmt::Debug for DispatchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTask")
            .field("category", &self.category())
            .field("subscription", &self.handler.id())
            .finish_non_exhaustive()
    }
}

impl DispatchTask {
    pub(crate) fn category(&self) -> Category {
        self.handler.category()
    }
}

/// Lock-free FIFO of pending deliveries.
///
/// Any number of threads may push; the drain loop is the only consumer.
#[derive(Debug, Default)]
pub(crate) struct DispatchQueue {
    tasks: SegQueue<DispatchTask>,
}

impl DispatchQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, task: DispatchTask) {
        self.tasks.push(task);
    }

    pub(crate) fn pop(&self) -> Option<DispatchTask> {
        self.tasks.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

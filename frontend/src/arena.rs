//! Per-draw work item storage

use alloc::vec::Vec;
use spin::RwLock;

use crate::work::{WorkItem, WorkItemId};

/// Append-only storage shared by every worker of a draw
pub trait WorkArena {
    /// Store `item` for the rest of the draw
    fn alloc(&self, item: WorkItem) -> WorkItemId;
}

/// Arena backed by a growable vector behind a reader-writer lock
#[derive(Default)]
pub struct DrawArena {
    items: RwLock<Vec<WorkItem>>,
}

impl DrawArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: WorkItemId) -> Option<WorkItem> {
        self.items.read().get(id.0 as usize).cloned()
    }

    /// Run `f` on a stored item without copying it
    pub fn with_item<R>(&self, id: WorkItemId, f: impl FnOnce(&WorkItem) -> R) -> Option<R> {
        self.items.read().get(id.0 as usize).map(f)
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every item; ids from the previous draw become invalid
    pub fn reset(&self) {
        self.items.write().clear();
    }
}

impl WorkArena for DrawArena {
    fn alloc(&self, item: WorkItem) -> WorkItemId {
        let mut items = self.items.write();
        let id = WorkItemId(items.len() as u32);
        items.push(item);
        id
    }
}

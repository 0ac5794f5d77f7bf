//! Ordered task queue.
//!
//! Insertion-ordered entries addressed by id. An entry whose unit slot is
//! empty is a placeholder: its unit is either being driven right now or was
//! lost, and [`TaskQueue::reindex`] drops it.

use crate::types::TaskId;
use crate::unit::Unit;

struct Entry<T> {
    id: TaskId,
    unit: Option<Unit<T>>,
}

/// Tasks owned by a scheduler, in drive order.
pub(crate) struct TaskQueue<T> {
    entries: Vec<Entry<T>>,
}

impl<T> TaskQueue<T> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn position(&self, id: &TaskId) -> Option<usize> {
        self.entries.iter().position(|e| &e.id == id)
    }

    /// Inserts at the tail, or replaces the unit in place when `id` exists.
    pub(crate) fn insert(&mut self, id: TaskId, unit: Unit<T>) {
        match self.position(&id) {
            Some(pos) => self.entries[pos].unit = Some(unit),
            None => self.entries.push(Entry {
                id,
                unit: Some(unit),
            }),
        }
    }

    pub(crate) fn remove(&mut self, id: &TaskId) -> bool {
        match self.position(id) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Moves an entry to the head, keeping the order of the rest.
    pub(crate) fn prioritize(&mut self, id: &TaskId) -> bool {
        match self.position(id) {
            Some(pos) => {
                self.entries[..=pos].rotate_right(1);
                true
            }
            None => false,
        }
    }

    /// Takes the unit out of its entry, leaving a placeholder behind.
    pub(crate) fn take(&mut self, id: &TaskId) -> Option<Unit<T>> {
        let pos = self.position(id)?;
        self.entries[pos].unit.take()
    }

    /// Returns a unit to its placeholder. Returns it back to the caller when
    /// the entry is gone.
    pub(crate) fn restore(&mut self, id: &TaskId, unit: Unit<T>) -> Option<Unit<T>> {
        match self.position(id) {
            Some(pos) => {
                self.entries[pos].unit = Some(unit);
                None
            }
            None => Some(unit),
        }
    }

    /// Ids of entries that still hold a unit, in order.
    pub(crate) fn pending(&self) -> Vec<TaskId> {
        self.entries
            .iter()
            .filter(|e| e.unit.is_some())
            .map(|e| e.id.clone())
            .collect()
    }

    pub(crate) fn first_pending(&self) -> Option<TaskId> {
        self.entries
            .iter()
            .find(|e| e.unit.is_some())
            .map(|e| e.id.clone())
    }

    /// Drops placeholders. Returns `false` on an empty queue.
    pub(crate) fn reindex(&mut self) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        self.entries.retain(|e| e.unit.is_some());
        true
    }

    pub(crate) fn contains(&self, id: &TaskId) -> bool {
        self.position(id).is_some()
    }

    pub(crate) fn ids(&self) -> Vec<TaskId> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

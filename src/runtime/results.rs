//! Result set collected by scheduler drives.

use std::fmt;

use hashbrown::HashMap;

use crate::types::TaskId;

/// Values of finished tasks, keyed by task id, in completion order.
///
/// Inserting an id that is already present replaces its value in place.
pub struct ResultSet<T> {
    entries: Vec<(TaskId, T)>,
    index: HashMap<TaskId, usize>,
}

impl<T> ResultSet<T> {
    /// Creates an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Records the value of a finished task.
    pub fn insert(&mut self, id: TaskId, value: T) {
        if let Some(&slot) = self.index.get(&id) {
            self.entries[slot].1 = value;
        } else {
            self.index.insert(id.clone(), self.entries.len());
            self.entries.push((id, value));
        }
    }

    /// Returns the value recorded for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&slot| &self.entries[slot].1)
    }

    /// Returns `true` if a value was recorded for `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Number of recorded values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids in completion order.
    pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
        self.entries.iter().map(|(id, _)| id)
    }

    /// `(id, value)` pairs in completion order.
    pub fn iter(&self) -> impl Iterator<Item = (&TaskId, &T)> {
        self.entries.iter().map(|(id, value)| (id, value))
    }

    /// Removes everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

impl<T> Default for ResultSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for ResultSet<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            index: self.index.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ResultSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<T> IntoIterator for ResultSet<T> {
    type Item = (TaskId, T);
    type IntoIter = std::vec::IntoIter<(TaskId, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

//! Identifier types for runtime entities.
//!
//! [`TaskId`] names an entry in a scheduler's queue and keys its result set.
//! [`UnitId`] names a suspendable unit for the lifetime of the process and is
//! what [`current`](crate::unit::current) reports.

use core::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static UNIT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Prefix of the synthetic ids assigned to positional tasks.
pub const TASK_PREFIX: &str = "task_";

/// Identifier of a task inside a scheduler.
///
/// Ids are cheap to clone. Positional ids follow the `task_{n}` convention;
/// ids created by [`Scheduler::enqueue`](crate::runtime::Scheduler::enqueue)
/// come from the scheduler's [`IdSource`](crate::util::IdSource).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(Arc<str>);

impl TaskId {
    /// Creates a task id from an arbitrary name.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Creates the synthetic id for a list position (`task_{index}`).
    #[must_use]
    pub fn positional(index: usize) -> Self {
        Self(Arc::from(format!("{TASK_PREFIX}{index}")))
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the list position if this is a synthetic positional id.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        self.0.strip_prefix(TASK_PREFIX)?.parse().ok()
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl fmt::Display for TaskId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<usize> for TaskId {
    fn from(index: usize) -> Self {
        Self::positional(index)
    }
}

impl From<&str> for TaskId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TaskId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&TaskId> for TaskId {
    fn from(id: &TaskId) -> Self {
        id.clone()
    }
}

impl Serialize for TaskId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::from)
    }
}

/// Process-unique identifier of a suspendable unit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(u64);

impl UnitId {
    /// Allocates the next unit id.
    #[must_use]
    pub(crate) fn next() -> Self {
        Self(UNIT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw counter value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for UnitId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitId({})", self.0)
    }
}

impl fmt::Display for UnitId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn positional_ids_follow_naming_scheme() {
        assert_eq!(TaskId::from(0).as_str(), "task_0");
        assert_eq!(TaskId::positional(12).to_string(), "task_12");
        assert_eq!(TaskId::from(7).position(), Some(7));
        assert_eq!(TaskId::from("fetch").position(), None);
        assert_eq!(TaskId::from("task_x").position(), None);
    }

    #[test]
    fn task_id_debug_format() {
        let dbg = format!("{:?}", TaskId::from("fetch"));
        assert_eq!(dbg, "TaskId(fetch)");
    }

    #[test]
    fn task_id_borrows_as_str() {
        let mut set = HashSet::new();
        set.insert(TaskId::from("a"));
        assert!(set.contains("a"));
        assert!(!set.contains("b"));
    }

    #[test]
    fn task_id_serde_roundtrip() {
        let id = TaskId::from("task_3");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"task_3\"");
        let back: TaskId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn unit_ids_are_unique() {
        let a = UnitId::next();
        let b = UnitId::next();
        assert_ne!(a, b);
        assert!(b > a);
        assert_eq!(format!("{a}"), format!("U{}", a.as_u64()));
    }
}

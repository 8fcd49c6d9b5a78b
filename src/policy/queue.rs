//! Priority queue backing `next_job`.
//!
//! A linear sorted vector is sufficient here: live job counts are
//! expected in the tens to hundreds (see spec's design notes), so the
//! constant factors of a plain `Vec` with binary-search insertion beat
//! a heap or tree in practice, and a `Vec` makes "iterate in order,
//! skipping excluded entries" trivial.

use std::cmp::Ordering;

use crate::models::JobId;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    priority: f64,
    id: JobId,
}

impl Entry {
    fn cmp_key(&self, other: &Entry) -> Ordering {
        // Ties broken by job id for determinism; spec leaves the
        // tiebreak unspecified but flags it as worth pinning down.
        self.priority
            .partial_cmp(&other.priority)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Ascending-priority ordered index over live jobs.
///
/// Exactly one entry per live job; the registry remains authoritative
/// on priority values; this is a derived structure kept in sync by
/// `PolicyServer`.
#[derive(Debug, Default, Clone)]
pub struct PriorityQueue {
    entries: Vec<Entry>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a new `(priority, id)` pair, maintaining ascending order.
    pub fn insert(&mut self, priority: f64, id: JobId) {
        let entry = Entry { priority, id };
        let pos = self
            .entries
            .binary_search_by(|e| e.cmp_key(&entry))
            .unwrap_or_else(|pos| pos);
        self.entries.insert(pos, entry);
    }

    /// Remove the entry for `id`, if present. Idempotent.
    pub fn remove(&mut self, id: JobId) {
        self.entries.retain(|e| e.id != id);
    }

    /// Remove and reinsert `id` at `new_priority`, used for the bias step.
    pub fn reposition(&mut self, id: JobId, new_priority: f64) {
        self.remove(id);
        self.insert(new_priority, id);
    }

    /// Iterate ids in ascending priority order.
    pub fn iter_ids(&self) -> impl Iterator<Item = JobId> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    /// Find the first id in ascending order not present in `exclude`.
    pub fn first_not_excluded(&self, exclude: &std::collections::HashSet<JobId>) -> Option<JobId> {
        self.entries
            .iter()
            .find(|e| !exclude.contains(&e.id))
            .map(|e| e.id)
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Vec<(f64, JobId)> {
        self.entries.iter().map(|e| (e.priority, e.id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jid(n: u128) -> JobId {
        JobId(uuid::Uuid::from_u128(n))
    }

    #[test]
    fn maintains_ascending_order() {
        let mut q = PriorityQueue::new();
        q.insert(-0.5, jid(1));
        q.insert(-1.0, jid(2));
        q.insert(0.2, jid(3));
        let snap = q.snapshot();
        assert_eq!(snap, vec![(-1.0, jid(2)), (-0.5, jid(1)), (0.2, jid(3))]);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut q = PriorityQueue::new();
        q.insert(-1.0, jid(1));
        q.remove(jid(1));
        q.remove(jid(1));
        assert!(q.is_empty());
    }

    #[test]
    fn reposition_moves_entry() {
        let mut q = PriorityQueue::new();
        q.insert(-1.0, jid(1));
        q.insert(-0.5, jid(2));
        q.reposition(jid(1), -0.25);
        assert_eq!(q.snapshot(), vec![(-0.5, jid(2)), (-0.25, jid(1))]);
    }

    #[test]
    fn first_not_excluded_skips_excluded() {
        let mut q = PriorityQueue::new();
        q.insert(-1.0, jid(1));
        q.insert(-0.5, jid(2));
        let mut exclude = std::collections::HashSet::new();
        exclude.insert(jid(1));
        assert_eq!(q.first_not_excluded(&exclude), Some(jid(2)));
    }

    #[test]
    fn ties_break_by_job_id() {
        let mut q = PriorityQueue::new();
        q.insert(-1.0, jid(5));
        q.insert(-1.0, jid(2));
        assert_eq!(q.snapshot(), vec![(-1.0, jid(2)), (-1.0, jid(5))]);
    }
}

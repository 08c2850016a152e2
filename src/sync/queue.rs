/// Pending optimistic edits for one synchronized view
///
/// Lifecycle of an edit:
/// 1. `push` stages it; it renders immediately
/// 2. `begin_commit` marks it in flight while the remote write runs
/// 3. `acknowledge` or `rollback` records the write outcome
/// 4. `reconcile` drops acknowledged edits once a snapshot shows them
///
/// Any edit older than the timeout stops rendering and is dropped on the next
/// reconcile, whatever its state.
use std::time::Duration;
use tokio::time::Instant;

use super::{EditId, EditState, OptimisticEdit, Snapshot};

#[derive(Debug)]
struct Entry {
    edit: OptimisticEdit,
    state: EditState,
}

#[derive(Debug)]
pub struct OptimisticQueue {
    entries: Vec<Entry>,
    timeout: Duration,
}

impl OptimisticQueue {
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: Vec::new(),
            timeout,
        }
    }

    /// Stages an edit after the edits already queued
    ///
    /// Staged edits on the same target and field are superseded. Edits whose
    /// write has started stay queued so the newest intent still renders last.
    pub fn push(&mut self, edit: OptimisticEdit) -> EditId {
        let id = edit.id;
        self.entries.retain(|entry| {
            entry.state != EditState::Staged || !entry.edit.touches(&edit.target_key, &edit.field)
        });
        self.entries.push(Entry {
            edit,
            state: EditState::Staged,
        });
        id
    }

    /// Marks a staged edit in flight and returns it, `None` once it is gone
    pub fn begin_commit(&mut self, id: EditId) -> Option<OptimisticEdit> {
        let entry = self.entries.iter_mut().find(|entry| entry.edit.id == id)?;
        entry.state = EditState::InFlight;
        Some(entry.edit.clone())
    }

    pub fn acknowledge(&mut self, id: EditId) -> bool {
        match self.entries.iter_mut().find(|entry| entry.edit.id == id) {
            Some(entry) => {
                entry.state = EditState::Acknowledged;
                true
            }
            None => false,
        }
    }

    /// Removes a failed edit so the rendered value snaps back
    pub fn rollback(&mut self, id: EditId) -> Option<OptimisticEdit> {
        let index = self.entries.iter().position(|entry| entry.edit.id == id)?;
        Some(self.entries.remove(index).edit)
    }

    /// Drops edits that `snapshot` already reflects, and expired ones
    ///
    /// Only acknowledged edits can be subsumed: an edit whose write has not
    /// landed may match the snapshot by coincidence and still be overwritten.
    pub fn reconcile(&mut self, snapshot: &Snapshot, now: Instant) -> usize {
        let before = self.entries.len();
        let timeout = self.timeout;
        self.entries.retain(|entry| {
            if is_expired(&entry.edit, now, timeout) {
                tracing::debug!(edit = %entry.edit.id, target = %entry.edit.target_key, "Optimistic edit expired");
                return false;
            }
            if entry.state != EditState::Acknowledged {
                return true;
            }
            let reflected = snapshot
                .get(&entry.edit.target_key)
                .is_some_and(|doc| entry.edit.op.is_reflected_in(doc.get(&entry.edit.field)));
            !reflected
        });
        before - self.entries.len()
    }

    /// Unexpired edits in issuance order, the input of [`super::merge`]
    pub fn active(&self, now: Instant) -> Vec<OptimisticEdit> {
        self.entries
            .iter()
            .filter(|entry| !is_expired(&entry.edit, now, self.timeout))
            .map(|entry| entry.edit.clone())
            .collect()
    }

    pub fn state_of(&self, id: EditId) -> Option<EditState> {
        self.entries
            .iter()
            .find(|entry| entry.edit.id == id)
            .map(|entry| entry.state)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_expired(edit: &OptimisticEdit, now: Instant, timeout: Duration) -> bool {
    now.saturating_duration_since(edit.issued_at) >= timeout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Document, FieldOp};
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn like(user: &str) -> OptimisticEdit {
        OptimisticEdit::new("p1", "likes", FieldOp::ArrayUnion(vec![json!(user)]))
    }

    fn unlike(user: &str) -> OptimisticEdit {
        OptimisticEdit::new("p1", "likes", FieldOp::ArrayRemove(vec![json!(user)]))
    }

    fn likes(users: &[&str]) -> Snapshot {
        Snapshot::new(vec![Document::new("p1", json!({ "likes": users }))])
    }

    #[test]
    fn test_staged_edit_is_superseded() {
        let mut queue = OptimisticQueue::new(TIMEOUT);
        let first = queue.push(like("u1"));
        let second = queue.push(unlike("u1"));

        assert_eq!(queue.len(), 1);
        assert!(queue.state_of(first).is_none());
        assert_eq!(queue.state_of(second), Some(EditState::Staged));
    }

    #[test]
    fn test_in_flight_edit_is_kept_in_order() {
        let mut queue = OptimisticQueue::new(TIMEOUT);
        let first = queue.push(like("u1"));
        queue.begin_commit(first).unwrap();
        let second = queue.push(unlike("u1"));

        let active = queue.active(Instant::now());
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, first);
        assert_eq!(active[1].id, second);
    }

    #[test]
    fn test_unacknowledged_edit_survives_matching_snapshot() {
        let mut queue = OptimisticQueue::new(TIMEOUT);
        let id = queue.push(like("u1"));
        queue.begin_commit(id);

        assert_eq!(queue.reconcile(&likes(&["u1"]), Instant::now()), 0);
        assert_eq!(queue.state_of(id), Some(EditState::InFlight));
    }

    #[test]
    fn test_acknowledged_edit_dropped_once_reflected() {
        let mut queue = OptimisticQueue::new(TIMEOUT);
        let id = queue.push(like("u1"));
        queue.begin_commit(id);
        assert!(queue.acknowledge(id));

        assert_eq!(queue.reconcile(&likes(&[]), Instant::now()), 0);
        assert_eq!(queue.reconcile(&Snapshot::empty(), Instant::now()), 0);
        assert_eq!(queue.reconcile(&likes(&["u2", "u1"]), Instant::now()), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_expired_edits_stop_rendering_and_are_dropped() {
        let mut queue = OptimisticQueue::new(TIMEOUT);
        queue.push(like("u1"));
        let later = Instant::now() + TIMEOUT;

        assert!(queue.active(later).is_empty());
        assert_eq!(queue.reconcile(&Snapshot::empty(), later), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_rollback_removes_edit() {
        let mut queue = OptimisticQueue::new(TIMEOUT);
        let id = queue.push(like("u1"));
        queue.begin_commit(id);

        assert!(queue.rollback(id).is_some());
        assert!(queue.rollback(id).is_none());
        assert!(!queue.acknowledge(id));
        assert!(queue.is_empty());
    }
}

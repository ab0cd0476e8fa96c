//! Debounced persistence queue between the engine and the remote store.
//!
//! Edits land in a pending set and start a debounce timer; the flush drains
//! the set atomically, issues deletes before upserts and batches upserts per
//! layer. A failed flush re-unions the drained items so nothing is lost, and
//! the session stays interactive while saves keep failing.

use crate::model::{LayerId, PageId, Stroke, StrokeId};
use crate::store::{PageStore, StoreResult};
use std::collections::{HashMap, HashSet};

/// Default debounce interval between an edit and its flush.
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// User-visible persistence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// Nothing pending and the last flush (if any) succeeded.
    #[default]
    Synced,
    /// Edits are waiting on the debounce timer.
    Pending,
    /// The last flush failed; items are re-queued for retry.
    Failed,
}

/// Not-yet-persisted edits: strokes to upsert keyed by id (last write wins)
/// and stroke ids to delete. An id never sits in both maps.
#[derive(Debug, Default)]
pub struct PendingSet {
    upserts: HashMap<StrokeId, Stroke>,
    deletes: HashSet<StrokeId>,
}

impl PendingSet {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.upserts.len() + self.deletes.len()
    }

    fn add_upsert(&mut self, stroke: Stroke) {
        self.deletes.remove(&stroke.id);
        self.upserts.insert(stroke.id, stroke);
    }

    fn add_delete(&mut self, id: StrokeId) {
        // Cancel a pending upsert, but still send the delete: the stroke may
        // already live remotely from an earlier flush. Absent ids are not an
        // error on the store side.
        self.upserts.remove(&id);
        self.deletes.insert(id);
    }

    fn drain(&mut self) -> PendingSet {
        PendingSet {
            upserts: std::mem::take(&mut self.upserts),
            deletes: std::mem::take(&mut self.deletes),
        }
    }

    /// Put a failed flush back. Items added since the drain win over the
    /// drained copies.
    fn reunion(&mut self, drained: PendingSet) {
        for (id, stroke) in drained.upserts {
            if !self.upserts.contains_key(&id) && !self.deletes.contains(&id) {
                self.upserts.insert(id, stroke);
            }
        }
        for id in drained.deletes {
            if !self.upserts.contains_key(&id) {
                self.deletes.insert(id);
            }
        }
    }
}

/// The queue proper. Timing is injected: callers pass the current monotonic
/// time so tests can drive the debounce deterministically.
#[derive(Debug, Default)]
pub struct SyncQueue {
    pending: PendingSet,
    debounce_ms: u64,
    deadline_ms: Option<u64>,
    status: SyncStatus,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::with_debounce(DEFAULT_DEBOUNCE_MS)
    }

    pub fn with_debounce(debounce_ms: u64) -> Self {
        Self {
            pending: PendingSet::default(),
            debounce_ms,
            deadline_ms: None,
            status: SyncStatus::Synced,
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Queue a stroke create/update and restart the debounce timer.
    pub fn schedule_upsert(&mut self, stroke: Stroke, now_ms: u64) {
        self.pending.add_upsert(stroke);
        self.touch(now_ms);
    }

    /// Queue a stroke deletion and restart the debounce timer.
    pub fn schedule_delete(&mut self, id: StrokeId, now_ms: u64) {
        self.pending.add_delete(id);
        self.touch(now_ms);
    }

    /// Restart the debounce timer without queueing anything. Used for edits
    /// that flush through side channels (image ops) but share the timer.
    pub fn restart_debounce(&mut self, now_ms: u64) {
        self.touch(now_ms);
    }

    /// Record a failed side-channel save: restart the timer for the retry
    /// and surface the failure.
    pub fn mark_failed(&mut self, now_ms: u64) {
        self.touch(now_ms);
        self.status = SyncStatus::Failed;
    }

    fn touch(&mut self, now_ms: u64) {
        self.deadline_ms = Some(now_ms + self.debounce_ms);
        if self.status != SyncStatus::Failed {
            self.status = SyncStatus::Pending;
        }
    }

    /// Whether the debounce timer has elapsed.
    pub fn due(&self, now_ms: u64) -> bool {
        self.deadline_ms.is_some_and(|d| now_ms >= d)
    }

    /// Drop everything unflushed (page switch discards, never flushes,
    /// in-progress work for the old page).
    pub fn clear(&mut self) {
        self.pending = PendingSet::default();
        self.deadline_ms = None;
        self.status = SyncStatus::Synced;
    }

    /// Flush the pending set: deletes first, then one batched upsert per
    /// layer. On failure everything drained is re-queued and the status
    /// reports the failed save. Call sites decide *when* (timer tick or
    /// forced flush on page close); the logic is identical.
    pub async fn flush(&mut self, store: &dyn PageStore, page: PageId) -> StoreResult<()> {
        if !self.has_pending() {
            self.deadline_ms = None;
            self.status = SyncStatus::Synced;
            return Ok(());
        }
        let drained = self.pending.drain();
        self.deadline_ms = None;

        match Self::push(store, page, &drained).await {
            Ok(()) => {
                self.status = if self.has_pending() {
                    SyncStatus::Pending
                } else {
                    SyncStatus::Synced
                };
                Ok(())
            }
            Err(err) => {
                log::warn!("sync flush failed, re-queueing {} items: {err}", drained.len());
                self.pending.reunion(drained);
                self.status = SyncStatus::Failed;
                Err(err)
            }
        }
    }

    async fn push(store: &dyn PageStore, page: PageId, drained: &PendingSet) -> StoreResult<()> {
        if !drained.deletes.is_empty() {
            let ids: Vec<StrokeId> = drained.deletes.iter().copied().collect();
            store.delete_strokes(page, ids).await?;
        }
        let mut by_layer: HashMap<LayerId, Vec<Stroke>> = HashMap::new();
        for stroke in drained.upserts.values() {
            by_layer.entry(stroke.layer_id).or_default().push(stroke.clone());
        }
        for (layer, strokes) in by_layer {
            store.upsert_strokes(page, layer, strokes).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LayerId, Rgba8, SamplePoint, ToolKind};
    use crate::store::{FlakyStore, MemoryStore, block_on};
    use uuid::Uuid;

    fn stroke(layer: LayerId) -> Stroke {
        Stroke::new(
            layer,
            ToolKind::Pen,
            Rgba8::black(),
            2.0,
            1.0,
            vec![SamplePoint::new(1.0, 1.0, 0.5, 0)],
        )
    }

    #[test]
    fn test_debounce_restarts_on_every_edit() {
        let mut queue = SyncQueue::with_debounce(1000);
        let layer = Uuid::new_v4();
        queue.schedule_upsert(stroke(layer), 0);
        assert!(!queue.due(500));
        queue.schedule_upsert(stroke(layer), 500);
        assert!(!queue.due(1000));
        assert!(queue.due(1500));
    }

    #[test]
    fn test_upsert_dedupes_by_id_last_write_wins() {
        let mut queue = SyncQueue::new();
        let layer = Uuid::new_v4();
        let mut s = stroke(layer);
        queue.schedule_upsert(s.clone(), 0);
        s.translate(5.0, 5.0);
        queue.schedule_upsert(s.clone(), 10);
        assert_eq!(queue.pending_len(), 1);

        let store = MemoryStore::new();
        let page = Uuid::new_v4();
        block_on(queue.flush(&store, page)).unwrap();
        let stored = store.stored_stroke(page, s.id).unwrap();
        assert_eq!(stored.bbox, s.bbox);
    }

    #[test]
    fn test_delete_of_unsaved_stroke_cancels_out() {
        let mut queue = SyncQueue::new();
        let layer = Uuid::new_v4();
        let s = stroke(layer);
        let id = s.id;
        queue.schedule_upsert(s, 0);
        queue.schedule_delete(id, 10);
        // The upsert is cancelled; only the (idempotent) delete goes out.
        let store = MemoryStore::new();
        let page = Uuid::new_v4();
        block_on(queue.flush(&store, page)).unwrap();
        assert_eq!(store.upsert_calls(), 0);
        assert_eq!(queue.status(), SyncStatus::Synced);
    }

    #[test]
    fn test_delete_after_reupsert_reaches_the_store() {
        let mut queue = SyncQueue::new();
        let layer = Uuid::new_v4();
        let s = stroke(layer);
        let id = s.id;
        let store = MemoryStore::new();
        let page = Uuid::new_v4();

        // Persist the stroke.
        queue.schedule_upsert(s.clone(), 0);
        block_on(queue.flush(&store, page)).unwrap();
        assert_eq!(store.stroke_count(page), 1);

        // Move it (re-upsert), then erase it before the next flush: the
        // remote copy must go away too.
        queue.schedule_upsert(s, 100);
        queue.schedule_delete(id, 110);
        block_on(queue.flush(&store, page)).unwrap();
        assert_eq!(store.stroke_count(page), 0);
        assert_eq!(queue.status(), SyncStatus::Synced);
    }

    #[test]
    fn test_flush_batches_per_layer() {
        let mut queue = SyncQueue::new();
        let (layer_a, layer_b) = (Uuid::new_v4(), Uuid::new_v4());
        queue.schedule_upsert(stroke(layer_a), 0);
        queue.schedule_upsert(stroke(layer_a), 1);
        queue.schedule_upsert(stroke(layer_b), 2);

        let store = MemoryStore::new();
        let page = Uuid::new_v4();
        block_on(queue.flush(&store, page)).unwrap();
        // One batched call per layer, not per stroke.
        assert_eq!(store.upsert_calls(), 2);
        assert_eq!(store.stroke_count(page), 3);
    }

    #[test]
    fn test_failed_flush_requeues_then_forced_flush_persists_once() {
        let mut queue = SyncQueue::new();
        let layer = Uuid::new_v4();
        queue.schedule_upsert(stroke(layer), 0);
        queue.schedule_upsert(stroke(layer), 1);

        let store = FlakyStore::new(MemoryStore::new(), 1);
        let page = Uuid::new_v4();

        assert!(block_on(queue.flush(&store, page)).is_err());
        assert_eq!(queue.status(), SyncStatus::Failed);
        assert_eq!(queue.pending_len(), 2);

        // Forced retry succeeds and persists each stroke exactly once.
        block_on(queue.flush(&store, page)).unwrap();
        assert_eq!(queue.status(), SyncStatus::Synced);
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(store.inner().stroke_count(page), 2);
        assert_eq!(store.inner().upsert_calls(), 1);
        assert!(!queue.has_pending());
    }

    #[test]
    fn test_reunion_keeps_newer_edits() {
        let mut queue = SyncQueue::new();
        let layer = Uuid::new_v4();
        let s = stroke(layer);
        let id = s.id;
        queue.schedule_upsert(s, 0);

        let store = FlakyStore::new(MemoryStore::new(), 1);
        let page = Uuid::new_v4();
        assert!(block_on(queue.flush(&store, page)).is_err());

        // The stroke was erased while the retry was pending: the delete,
        // being newer, must win over the re-queued upsert.
        queue.schedule_delete(id, 50);
        block_on(queue.flush(&store, page)).unwrap();
        assert_eq!(store.inner().stroke_count(page), 0);
    }
}

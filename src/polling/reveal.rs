//! Staggered reveal of newly arrived thoughts.
//!
//! Pending reveals are plain queue entries with a fire instant; the runtime
//! loop sleeps until [`RevealQueue::next_deadline`] and drains whatever is
//! due. Cancelling is clearing the queue.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::ReasoningEntry;

#[derive(Debug, Clone)]
pub struct PendingReveal {
    pub fire_at: Instant,
    pub entry: ReasoningEntry,
}

/// Queue of reveals ordered by fire instant (and therefore by id)
#[derive(Debug, Default)]
pub struct RevealQueue {
    pending: VecDeque<PendingReveal>,
}

impl RevealQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a batch, superseding whatever is still pending.
    ///
    /// Unrevealed entries of the previous batch are folded into the new one,
    /// so each entry is revealed exactly once. The merged batch is ordered by
    /// id and the k-th entry fires at `now + k * stagger`.
    pub fn schedule_batch(
        &mut self,
        entries: Vec<ReasoningEntry>,
        now: Instant,
        stagger: Duration,
    ) -> usize {
        let mut batch: Vec<ReasoningEntry> =
            self.pending.drain(..).map(|pending| pending.entry).collect();
        for entry in entries {
            if !batch.iter().any(|existing| existing.id == entry.id) {
                batch.push(entry);
            }
        }
        batch.sort_by(|a, b| a.id.cmp(&b.id));

        self.pending = batch
            .into_iter()
            .enumerate()
            .map(|(index, entry)| PendingReveal {
                fire_at: now + stagger * index as u32,
                entry,
            })
            .collect();
        self.pending.len()
    }

    /// Remove and return every entry due at `now`, oldest first
    pub fn pop_due(&mut self, now: Instant) -> Vec<ReasoningEntry> {
        let mut due = Vec::new();
        while let Some(front) = self.pending.front() {
            if front.fire_at > now {
                break;
            }
            if let Some(pending) = self.pending.pop_front() {
                due.push(pending.entry);
            }
        }
        due
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.front().map(|pending| pending.fire_at)
    }

    /// Drop every pending reveal, returning how many were cancelled
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        cancelled
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingReveal> {
        self.pending.iter()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::fixtures::snapshot_with_ids;
    use crate::domain::ThoughtId;

    const STAGGER: Duration = Duration::from_secs(2);

    fn entries(ids: &[i64]) -> Vec<ReasoningEntry> {
        snapshot_with_ids(ids).agent_thoughts
    }

    #[test]
    fn test_batch_fires_in_id_order_with_stagger() {
        let mut queue = RevealQueue::new();
        let now = Instant::now();
        assert_eq!(queue.schedule_batch(entries(&[5, 4]), now, STAGGER), 2);

        let fire: Vec<_> = queue
            .pending()
            .map(|p| (p.entry.id.clone(), p.fire_at - now))
            .collect();
        assert_eq!(
            fire,
            vec![
                (ThoughtId::Num(4), Duration::ZERO),
                (ThoughtId::Num(5), STAGGER)
            ]
        );

        assert_eq!(queue.pop_due(now).len(), 1);
        assert!(queue.pop_due(now + Duration::from_millis(1999)).is_empty());
        let second = queue.pop_due(now + STAGGER);
        assert_eq!(second[0].id, ThoughtId::Num(5));
        assert!(queue.is_empty());
        assert!(queue.next_deadline().is_none());
    }

    #[test]
    fn test_superseding_batch_folds_pending_without_duplicates() {
        let mut queue = RevealQueue::new();
        let t0 = Instant::now();
        queue.schedule_batch(entries(&[2, 3]), t0, STAGGER);
        let revealed = queue.pop_due(t0);
        assert_eq!(revealed[0].id, ThoughtId::Num(2));

        let t1 = t0 + Duration::from_millis(500);
        queue.schedule_batch(entries(&[3, 4]), t1, STAGGER);

        let ids: Vec<_> = queue.pending().map(|p| p.entry.id.clone()).collect();
        assert_eq!(ids, vec![ThoughtId::Num(3), ThoughtId::Num(4)]);
        assert_eq!(queue.next_deadline(), Some(t1));
    }

    #[test]
    fn test_cancel_all_clears_queue() {
        let mut queue = RevealQueue::new();
        let now = Instant::now();
        queue.schedule_batch(entries(&[1, 2, 3]), now, STAGGER);
        assert_eq!(queue.cancel_all(), 3);
        assert!(queue.pop_due(now + STAGGER * 10).is_empty());
    }
}

//! Snapshot poller
//!
//! Commits fetched snapshots, detects newly arrived thoughts, stages their
//! reveal and keeps human decisions in sync with the decision store. The
//! poller holds no timers of its own: the runtime loop asks it for its next
//! reveal deadline and feeds it fetch results.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::reveal::RevealQueue;
use super::source::{DataOrigin, Fetched, SnapshotSource};
use crate::config::PollerConfig;
use crate::domain::{latest_id, Decision, Feedback, ReasoningEntry, Snapshot, ThoughtId};
use crate::error::Result;
use crate::persistence::{
    proposal_decision_key, thought_feedback_key, DecisionRecord, DecisionStore, FeedbackRecord,
    DECISION_LOG, FEEDBACK_LOG,
};

/// Result of committing one fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Updated {
        origin: DataOrigin,
        new_entries: usize,
    },
    Failed {
        retry_count: u32,
    },
}

pub struct DataPoller {
    source: Arc<dyn SnapshotSource>,
    store: Box<dyn DecisionStore>,
    config: PollerConfig,
    data: Option<Snapshot>,
    origin: Option<DataOrigin>,
    new_thoughts: Vec<ReasoningEntry>,
    is_loading: bool,
    error: Option<String>,
    retry_count: u32,
    reveals: RevealQueue,
}

impl DataPoller {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        store: Box<dyn DecisionStore>,
        config: PollerConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
            data: None,
            origin: None,
            new_thoughts: Vec::new(),
            is_loading: true,
            error: None,
            retry_count: 0,
            reveals: RevealQueue::new(),
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.data.as_ref()
    }

    pub fn origin(&self) -> Option<DataOrigin> {
        self.origin
    }

    /// Revealed thoughts, newest first
    pub fn new_thoughts(&self) -> &[ReasoningEntry] {
        &self.new_thoughts
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn pending_reveals(&self) -> usize {
        self.reveals.len()
    }

    pub fn store(&self) -> &dyn DecisionStore {
        self.store.as_ref()
    }

    /// A detached fetch, suitable for spawning while the loop keeps running
    pub fn fetch_task(&self) -> impl Future<Output = Result<Fetched>> + Send + 'static {
        let source = Arc::clone(&self.source);
        async move { source.fetch().await }
    }

    /// Fetch and commit in one step
    pub async fn poll_once(&mut self, now: Instant) -> PollOutcome {
        let result = self.source.fetch().await;
        self.commit(result, now)
    }

    /// Apply a fetch result. Failures never touch the committed snapshot.
    pub fn commit(&mut self, result: Result<Fetched>, now: Instant) -> PollOutcome {
        match result {
            Ok(Fetched {
                mut snapshot,
                origin,
            }) => {
                snapshot.touch_sync(Utc::now());
                self.restore_decisions(&mut snapshot);

                let new_entries = self.detect_new(&snapshot);
                let count = new_entries.len();
                if count > 0 {
                    let scheduled =
                        self.reveals
                            .schedule_batch(new_entries, now, self.config.stagger());
                    debug!("{} new thoughts detected, {} reveals pending", count, scheduled);
                }

                if self.origin != Some(origin) {
                    info!("Snapshot source: {:?}", origin);
                }
                self.data = Some(snapshot);
                self.origin = Some(origin);
                self.error = None;
                self.is_loading = false;
                self.retry_count = 0;

                PollOutcome::Updated {
                    origin,
                    new_entries: count,
                }
            }
            Err(e) => {
                warn!("Data polling error: {}", e);
                self.error = Some(e.to_string());
                self.retry_count += 1;
                if self.retry_count > self.config.max_silent_failures {
                    self.is_loading = false;
                }
                PollOutcome::Failed {
                    retry_count: self.retry_count,
                }
            }
        }
    }

    /// Entries of `incoming` newer than the committed boundary, oldest first.
    /// The very first commit establishes the boundary without revealing anything.
    fn detect_new(&self, incoming: &Snapshot) -> Vec<ReasoningEntry> {
        let Some(current) = &self.data else {
            return Vec::new();
        };
        let boundary = latest_id(&current.agent_thoughts);

        let mut fresh: Vec<ReasoningEntry> = incoming
            .agent_thoughts
            .iter()
            .filter(|thought| boundary.map_or(true, |last| &thought.id > last))
            .cloned()
            .collect();
        fresh.sort_by(|a, b| a.id.cmp(&b.id));
        fresh
    }

    fn restore_decisions(&self, snapshot: &mut Snapshot) {
        if let Some(proposal) = snapshot.current_proposal_mut() {
            match self.store.get(&proposal_decision_key(&proposal.id)) {
                Ok(Some(saved)) => match saved.parse::<Decision>() {
                    Ok(decision) => proposal.apply_decision(decision),
                    Err(e) => debug!("Ignoring stored decision for {}: {}", proposal.id, e),
                },
                Ok(None) => {}
                Err(e) => warn!("Failed to read stored decision: {}", e),
            }
        }

        for thought in &mut snapshot.agent_thoughts {
            if let Ok(Some(saved)) = self.store.get(&thought_feedback_key(&thought.id)) {
                if let Ok(feedback) = saved.parse::<Feedback>() {
                    thought.human_feedback = Some(feedback);
                }
            }
        }
    }

    /// Move every due reveal into the revealed list. Returns how many were revealed.
    pub fn reveal_due(&mut self, now: Instant) -> usize {
        let due = self.reveals.pop_due(now);
        let count = due.len();
        for thought in due {
            debug!("Revealing thought {}", thought.id);
            self.new_thoughts.insert(0, thought);
        }
        count
    }

    pub fn next_reveal_at(&self) -> Option<Instant> {
        self.reveals.next_deadline()
    }

    pub fn cancel_reveals(&mut self) -> usize {
        let cancelled = self.reveals.cancel_all();
        if cancelled > 0 {
            debug!("Cancelled {} pending reveals", cancelled);
        }
        cancelled
    }

    pub fn clear_new_thoughts(&mut self) {
        self.new_thoughts.clear();
    }

    /// Record feedback on a thought: audit log, point lookup, in-memory patch.
    /// Returns whether the committed snapshot contained the thought.
    pub fn submit_feedback(&mut self, thought_id: &ThoughtId, feedback: Feedback) -> bool {
        let record = FeedbackRecord {
            thought_id: thought_id.clone(),
            feedback,
            timestamp: Utc::now(),
        };
        self.persist(FEEDBACK_LOG, &record, &thought_feedback_key(thought_id), feedback.as_str());

        for thought in self.new_thoughts.iter_mut().filter(|t| &t.id == thought_id) {
            thought.human_feedback = Some(feedback);
        }
        self.data
            .as_mut()
            .map_or(false, |data| data.apply_feedback(thought_id, feedback))
    }

    /// Approve or reject a proposal: audit log, point lookup, in-memory patch.
    /// Returns whether the committed snapshot's current proposal matched.
    pub fn decide(&mut self, proposal_id: &str, decision: Decision) -> bool {
        let record = DecisionRecord {
            proposal_id: proposal_id.to_string(),
            decision,
            timestamp: Utc::now(),
        };
        self.persist(
            DECISION_LOG,
            &record,
            &proposal_decision_key(proposal_id),
            decision.as_str(),
        );

        self.data
            .as_mut()
            .map_or(false, |data| data.apply_decision(proposal_id, decision))
    }

    /// Best-effort write; storage failures are logged and swallowed
    fn persist<T: serde::Serialize>(&mut self, log: &str, record: &T, key: &str, value: &str) {
        if let Err(e) = self.try_persist(log, record, key, value) {
            warn!("Failed to persist {} ({}): {}", key, log, e);
        }
    }

    fn try_persist<T: serde::Serialize>(
        &mut self,
        log: &str,
        record: &T,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let record = serde_json::to_value(record)?;
        self.store.append_to_log(log, record)?;
        self.store.set(key, value)
    }

    /// Cancel everything scheduled; nothing is revealed after this
    pub fn teardown(&mut self) {
        self.cancel_reveals();
    }
}

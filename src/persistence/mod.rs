//! Persistence of human decisions
//!
//! Approvals, rejections and thought feedback are kept both as append-only
//! audit logs and as point lookups so that they survive refetches and restarts.

pub mod decision_store;

pub use decision_store::{
    corrupt_log_key, proposal_decision_key, thought_feedback_key, DecisionRecord, DecisionStore, FeedbackRecord,
    JsonFileStore, MemoryStore, DECISION_LOG, FEEDBACK_LOG,
};

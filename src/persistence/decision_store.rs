//! Durable key-value store for human decisions
//!
//! Values are plain strings, mirroring browser local storage: point lookups
//! hold a single verdict, and audit logs are JSON arrays serialized under
//! their own key and only ever appended to.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Decision, Feedback, ThoughtId};
use crate::error::{DecisifyError, Result};

/// Audit log of feedback on individual thoughts
pub const FEEDBACK_LOG: &str = "agent_feedback";
/// Audit log of proposal approvals and rejections
pub const DECISION_LOG: &str = "proposal_decisions";

/// Key an unreadable log is moved to before a fresh log replaces it
pub fn corrupt_log_key(log: &str) -> String {
    format!("{}_corrupt", log)
}

/// Point-lookup key for a proposal's decision
pub fn proposal_decision_key(proposal_id: &str) -> String {
    format!("proposal_{}_decision", proposal_id)
}

/// Point-lookup key for a thought's feedback
pub fn thought_feedback_key(thought_id: &ThoughtId) -> String {
    format!("thought_{}_feedback", thought_id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub thought_id: ThoughtId,
    pub feedback: Feedback,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub proposal_id: String,
    pub decision: Decision,
    pub timestamp: DateTime<Utc>,
}

/// Key-value persistence injected into the poller
pub trait DecisionStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Append one record to the JSON array stored under `log`.
    ///
    /// An unreadable log is copied to [`corrupt_log_key`] before a new log
    /// starts, so earlier records are never silently overwritten.
    fn append_to_log(&mut self, log: &str, record: serde_json::Value) -> Result<()> {
        let mut entries = match self.get(log)? {
            Some(raw) => match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    let backup = corrupt_log_key(log);
                    warn!(log, backup = %backup, "Audit log is unreadable, moving it aside: {}", e);
                    self.set(&backup, &raw)?;
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        entries.push(record);
        let encoded = serde_json::to_string(&entries)?;
        self.set(log, &encoded)
    }

    /// Read every record of a log. A missing or unreadable log reads as empty.
    fn read_log(&self, log: &str) -> Result<Vec<serde_json::Value>> {
        let Some(raw) = self.get(log)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(log, "Audit log is unreadable, treating it as empty: {}", e);
                Ok(Vec::new())
            }
        }
    }
}

/// Volatile store, used when no storage path is configured
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DecisionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store persisted as a single JSON object on disk
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw).map_err(|e| {
                    DecisifyError::Storage(format!("corrupt store {}: {}", path.display(), e))
                })?
            }
        } else {
            HashMap::new()
        };
        debug!("Opened decision store {} ({} keys)", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DecisionStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }
}

//! Snapshot polling
//!
//! - `source`: primary endpoint with static fallback
//! - `reveal`: staggered reveal queue for newly arrived thoughts
//! - `poller`: commit, change detection and decision sync

pub mod poller;
pub mod reveal;
pub mod source;

pub use poller::{DataPoller, PollOutcome};
pub use reveal::{PendingReveal, RevealQueue};
pub use source::{DataOrigin, Fallback, Fetched, HttpSnapshotSource, SnapshotSource};

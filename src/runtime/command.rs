//! Runtime commands and the published view

use serde::Serialize;

use crate::demo::{DemoKey, DemoSpeed, DemoState};
use crate::domain::{Decision, Feedback, ReasoningEntry, Snapshot, ThoughtId};
use crate::polling::DataOrigin;

/// Commands sent to the runtime loop
#[derive(Debug, Clone)]
pub enum DashboardCommand {
    /// Thumbs up/down on a reasoning entry
    SubmitFeedback {
        thought_id: ThoughtId,
        feedback: Feedback,
    },
    /// Approve or reject the current proposal
    Decide {
        proposal_id: String,
        decision: Decision,
    },
    /// A resolved demo shortcut
    Key(DemoKey),
    /// Dismiss the "new thoughts" highlight
    ClearNewThoughts,
    /// Stop the loop and cancel every timer
    Shutdown,
}

/// Read-only state published after every loop iteration
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    /// Displayed snapshot: simulated in demo mode, polled otherwise
    pub snapshot: Option<Snapshot>,
    pub origin: Option<DataOrigin>,
    /// Full thought log shown to the user
    pub thoughts: Vec<ReasoningEntry>,
    /// Highlighted thoughts, newest first
    pub new_thoughts: Vec<ReasoningEntry>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub retry_count: u32,
    pub pending_reveals: usize,
    pub demo_state: DemoState,
    pub demo_speed: DemoSpeed,
    pub fullscreen: bool,
    pub agent_thinking: bool,
}

impl Default for DashboardView {
    fn default() -> Self {
        Self {
            snapshot: None,
            origin: None,
            thoughts: Vec::new(),
            new_thoughts: Vec::new(),
            is_loading: true,
            error: None,
            retry_count: 0,
            pending_reveals: 0,
            demo_state: DemoState::Off,
            demo_speed: DemoSpeed::X1,
            fullscreen: false,
            agent_thinking: false,
        }
    }
}

impl DashboardView {
    pub fn is_demo(&self) -> bool {
        self.demo_state.is_enabled()
    }
}

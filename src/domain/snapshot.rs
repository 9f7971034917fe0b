//! Snapshot document describing the agent's perception, execution and
//! context memory at one instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lenient;
use super::thought::{Feedback, ReasoningEntry, ThoughtId};
use crate::error::{DecisifyError, Result};

/// Human verdict on a strategy proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::Rejected => "rejected",
        }
    }

    /// Proposal status implied by this decision
    pub fn resulting_status(&self) -> ProposalStatus {
        match self {
            Decision::Approved => ProposalStatus::Executing,
            Decision::Rejected => ProposalStatus::Rejected,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "approved" | "approve" => Ok(Decision::Approved),
            "rejected" | "reject" => Ok(Decision::Rejected),
            other => Err(format!("invalid decision '{}'; expected approved|rejected", other)),
        }
    }
}

/// Lifecycle status of the current proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Active,
    PendingApproval,
    Executing,
    Rejected,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(deserialize_with = "lenient::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub agent_status: String,
    #[serde(default)]
    pub context_window_hours: Option<u32>,
    #[serde(default)]
    pub total_events_tracked: u64,
    #[serde(default)]
    pub system_status: String,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub sync_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsPoint {
    #[serde(deserialize_with = "lenient::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub odds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolymarketPerception {
    #[serde(default)]
    pub event: String,
    pub current_odds: f64,
    #[serde(default)]
    pub delta_1h: f64,
    #[serde(default)]
    pub delta_24h: f64,
    #[serde(default)]
    pub volume_24h: f64,
    #[serde(default)]
    pub liquidity: f64,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub last_trade: Option<DateTime<Utc>>,
    #[serde(default)]
    pub history: Vec<OddsPoint>,
}

/// One social signal from the X intelligence feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialSignal {
    #[serde(default)]
    pub id: String,
    pub handle: String,
    pub content: String,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Categorical label (BULLISH / BEARISH / NEUTRAL)
    #[serde(default)]
    pub sentiment: String,
    pub sentiment_score: f64,
    pub agent_relevance_score: f64,
    #[serde(default)]
    pub extracted_entities: Vec<String>,
    #[serde(default)]
    pub impact_score: f64,
    #[serde(default)]
    pub follower_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Indicators {
    pub keltner_upper: f64,
    pub keltner_middle: f64,
    pub keltner_lower: f64,
    pub atr: f64,
    pub trend: String,
}

/// Quant strategy snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NautilusSnapshot {
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub signal_strength: f64,
    #[serde(default)]
    pub entry_price: f64,
    #[serde(default)]
    pub current_price: f64,
    #[serde(default)]
    pub unrealized_pnl: f64,
    #[serde(default)]
    pub daily_pnl: f64,
    #[serde(default)]
    pub position_size: f64,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::section")]
    pub indicators: Option<Indicators>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perception {
    #[serde(default, deserialize_with = "lenient::section")]
    pub polymarket: Option<PolymarketPerception>,
    #[serde(default)]
    pub x_intelligence: Vec<SocialSignal>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub nautilus: Option<NautilusSnapshot>,
}

/// Pairwise correlations between the three perception channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangulationMatrix {
    pub polymarket_x_correlation: f64,
    pub polymarket_nautilus_correlation: f64,
    pub x_nautilus_correlation: f64,
    pub overall_alignment: f64,
    #[serde(default)]
    pub interpretation: String,
}

impl TriangulationMatrix {
    /// Build a matrix whose alignment and interpretation derive from the correlations
    pub fn from_correlations(polymarket_x: f64, polymarket_nautilus: f64, x_nautilus: f64) -> Self {
        let overall = (polymarket_x + polymarket_nautilus + x_nautilus) / 3.0;
        Self {
            polymarket_x_correlation: polymarket_x,
            polymarket_nautilus_correlation: polymarket_nautilus,
            x_nautilus_correlation: x_nautilus,
            overall_alignment: overall,
            interpretation: interpret_alignment(overall).to_string(),
        }
    }
}

/// Categorical reading of an overall alignment score
pub fn interpret_alignment(overall: f64) -> &'static str {
    if overall > 0.75 {
        "HIGH_BULLISH"
    } else if overall > 0.6 {
        "MODERATE_BULLISH"
    } else if overall > 0.4 {
        "NEUTRAL"
    } else {
        "BEARISH"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub action: String,
    #[serde(default)]
    pub asset: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub risk_level: String,
    #[serde(default)]
    pub expected_return: Option<f64>,
    #[serde(default)]
    pub confidence: f64,
    pub status: ProposalStatus,
    #[serde(default, deserialize_with = "lenient::optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub human_decision: Option<Decision>,
}

impl Proposal {
    pub fn apply_decision(&mut self, decision: Decision) {
        self.human_decision = Some(decision);
        self.status = decision.resulting_status();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    #[serde(default, deserialize_with = "lenient::section")]
    pub current_proposal: Option<Proposal>,
    #[serde(default)]
    pub proposal_history: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEvent {
    pub id: String,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    pub relevance_decay: f64,
    #[serde(default)]
    pub impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMemory {
    #[serde(default)]
    pub events: Vec<ContextEvent>,
}

/// The full state document at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, deserialize_with = "lenient::section")]
    pub meta: Option<Meta>,
    /// Reasoning entries, newest first
    #[serde(deserialize_with = "lenient::entries")]
    pub agent_thoughts: Vec<ReasoningEntry>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub triangulation_matrix: Option<TriangulationMatrix>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub perception: Option<Perception>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub execution: Option<Execution>,
    #[serde(default, deserialize_with = "lenient::section")]
    pub context_memory: Option<ContextMemory>,
    /// Sections this engine does not interpret, kept verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Snapshot {
    /// Validate and decode a raw payload.
    ///
    /// A payload without an `agent_thoughts` array is rejected outright so
    /// that nothing from it is ever committed. Anything else that does not
    /// match its shape is dropped section by section.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        match value.get("agent_thoughts") {
            Some(serde_json::Value::Array(_)) => {}
            _ => {
                return Err(DecisifyError::InvalidSnapshot(
                    "missing agent_thoughts".to_string(),
                ))
            }
        }
        serde_json::from_value(value).map_err(|e| DecisifyError::InvalidSnapshot(e.to_string()))
    }

    /// Decode and validate a raw JSON body
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(body)?;
        Self::from_value(value)
    }

    pub fn current_proposal(&self) -> Option<&Proposal> {
        self.execution.as_ref()?.current_proposal.as_ref()
    }

    pub fn current_proposal_mut(&mut self) -> Option<&mut Proposal> {
        self.execution.as_mut()?.current_proposal.as_mut()
    }

    /// Attach feedback to the entry with the given id. Returns false when no entry matches.
    pub fn apply_feedback(&mut self, id: &ThoughtId, feedback: Feedback) -> bool {
        let mut found = false;
        for thought in self.agent_thoughts.iter_mut().filter(|t| &t.id == id) {
            thought.human_feedback = Some(feedback);
            found = true;
        }
        found
    }

    /// Record a decision on the current proposal if its id matches
    pub fn apply_decision(&mut self, proposal_id: &str, decision: Decision) -> bool {
        match self.current_proposal_mut() {
            Some(proposal) if proposal.id == proposal_id => {
                proposal.apply_decision(decision);
                true
            }
            _ => false,
        }
    }

    /// Mark the snapshot as freshly synced
    pub fn touch_sync(&mut self, now: DateTime<Utc>) {
        if let Some(meta) = self.meta.as_mut() {
            meta.sync_timestamp = Some(now);
        }
    }
}

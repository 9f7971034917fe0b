//! Whole-document snapshot fabrication from an explicit evolving state.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Map};

use super::random_walk::walk_relative;
use crate::domain::{
    ContextEvent, ContextMemory, Execution, Indicators, Meta, NautilusSnapshot, OddsPoint,
    Perception, PolymarketPerception, Proposal, ProposalStatus, ReasoningEntry, Snapshot,
    SocialSignal, ThoughtId, TriangulationMatrix,
};

const HANDLES: [&str; 5] = [
    "@crypto_analyst",
    "@btc_trader",
    "@market_watch",
    "@chain_analysis",
    "@whale_alert",
];

/// Base values that drift between generated snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorState {
    pub base_price: f64,
    pub base_odds: f64,
    pub base_sentiment: f64,
    pub base_signal: f64,
    pub event_counter: u64,
}

impl Default for SimulatorState {
    fn default() -> Self {
        Self {
            base_price: 42_000.0,
            base_odds: 0.65,
            base_sentiment: 0.7,
            base_signal: 0.5,
            event_counter: 42,
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

fn sentiment_label(sentiment: f64) -> &'static str {
    if sentiment > 0.6 {
        "BULLISH"
    } else if sentiment < 0.4 {
        "BEARISH"
    } else {
        "NEUTRAL"
    }
}

fn action_for(sentiment: f64) -> &'static str {
    if sentiment > 0.65 {
        "BUY"
    } else if sentiment < 0.35 {
        "SELL"
    } else {
        "HOLD"
    }
}

fn position_for(signal: f64) -> &'static str {
    if signal > 0.5 {
        "LONG"
    } else if signal < 0.3 {
        "SHORT"
    } else {
        "FLAT"
    }
}

impl SimulatorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore the initial base values
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Evolve the base values one step and fabricate a complete snapshot from them
    pub fn generate<R: Rng + ?Sized>(&mut self, rng: &mut R, now: DateTime<Utc>) -> Snapshot {
        self.base_price = walk_relative(rng, self.base_price, 38_000.0, 46_000.0, 0.005);
        self.base_odds = walk_relative(rng, self.base_odds, 0.3, 0.85, 0.03);
        self.base_sentiment = walk_relative(rng, self.base_sentiment, 0.2, 0.95, 0.04);
        self.base_signal = walk_relative(rng, self.base_signal, 0.15, 0.85, 0.035);
        if rng.gen::<f64>() > 0.7 {
            self.event_counter += 1;
        }

        let current_price = self.base_price + (rng.gen::<f64>() - 0.5) * 200.0;
        let entry_price = self.base_price - rng.gen::<f64>() * 300.0;
        let delta_1h = (rng.gen::<f64>() - 0.5) * 0.08;
        let delta_24h = (rng.gen::<f64>() - 0.5) * 0.15;

        let sentiment = sentiment_label(self.base_sentiment);
        let action = action_for(self.base_sentiment);
        let position = position_for(self.base_signal);
        let confidence = round_to(0.55 + rng.gen::<f64>() * 0.3, 2);
        let millis = now.timestamp_millis();

        // Attention weights summing to 1.0
        let w_polymarket = round_to(0.3 + rng.gen::<f64>() * 0.2, 2);
        let w_sentiment = round_to(0.2 + rng.gen::<f64>() * 0.2, 2);
        let w_nautilus = round_to(1.0 - w_polymarket - w_sentiment, 2);

        let matrix = TriangulationMatrix::from_correlations(
            round_to(0.6 + rng.gen::<f64>() * 0.35, 2),
            round_to(0.5 + rng.gen::<f64>() * 0.35, 2),
            round_to(0.5 + rng.gen::<f64>() * 0.3, 2),
        );

        let odds = round_to(self.base_odds, 2);
        let pct = |v: f64| format!("{}{:.1}%", if v >= 0.0 { "+" } else { "" }, v * 100.0);

        let mut inputs = Map::new();
        inputs.insert(
            "weights".to_string(),
            json!({
                "polymarket": w_polymarket,
                "x_sentiment": w_sentiment,
                "nautilus": w_nautilus,
            }),
        );
        inputs.insert("action".to_string(), json!(action));

        let thought = ReasoningEntry {
            id: ThoughtId::Text(format!("thought_{}", millis)),
            timestamp: now,
            kind: "TRIANGULATION".to_string(),
            reasoning: format!(
                "Live analysis: signal confidence {:.0}%. Polymarket shows {} trend ({} 1h), X sentiment {:.2}, Nautilus signal strength {:.2}.",
                confidence * 100.0,
                sentiment.to_lowercase(),
                pct(delta_1h),
                self.base_sentiment,
                self.base_signal,
            ),
            confidence,
            inputs,
            human_feedback: None,
        };

        let price_k = (current_price / 1000.0).round();
        let tweet_templates = [
            format!("BTC breaking resistance at ${price_k}k. Strong momentum building. #Bitcoin"),
            format!(
                "Market showing {} signals. Volume increasing at ${price_k}k level. #Crypto",
                sentiment.to_lowercase()
            ),
            format!("Technical analysis suggests ${price_k}k is key support. Watch closely. #BTC"),
            format!("Institutional interest growing. BTC holding ${price_k}k. #Bitcoin #Crypto"),
            format!(
                "Breaking: BTC {} {:.1}% in last hour. Currently at ${price_k}k. #Bitcoin",
                if delta_1h > 0.0 { "surges" } else { "dips" },
                (delta_1h * 100.0).abs()
            ),
        ];
        let content = tweet_templates
            .choose(rng)
            .cloned()
            .unwrap_or_default();

        let signal = SocialSignal {
            id: format!("tweet_live_{}", millis),
            handle: HANDLES.choose(rng).copied().unwrap_or(HANDLES[0]).to_string(),
            content,
            timestamp: Some(now),
            sentiment: sentiment.to_string(),
            sentiment_score: round_to(self.base_sentiment, 2),
            agent_relevance_score: round_to(0.7 + rng.gen::<f64>() * 0.25, 2),
            extracted_entities: vec!["BTC".into(), "resistance".into(), "momentum".into()],
            impact_score: round_to(self.base_sentiment * 10.0, 1),
            follower_count: rng.gen_range(50_000..200_000),
        };

        let nautilus = NautilusSnapshot {
            strategy: "Keltner Channel Breakout".to_string(),
            position: position.to_string(),
            signal_strength: round_to(self.base_signal, 2),
            entry_price: round_to(entry_price, 2),
            current_price: round_to(current_price, 2),
            unrealized_pnl: round_to(current_price, 2) - round_to(entry_price, 2),
            daily_pnl: round_to(-500.0 + rng.gen::<f64>() * 2500.0, 2),
            position_size: round_to(0.5 + rng.gen::<f64>(), 1),
            status: if position != "FLAT" { "ACTIVE" } else { "IDLE" }.to_string(),
            indicators: Some(Indicators {
                keltner_upper: round_to(current_price + 600.0, 2),
                keltner_middle: round_to(current_price, 2),
                keltner_lower: round_to(current_price - 600.0, 2),
                atr: round_to(350.0 + rng.gen::<f64>() * 200.0, 2),
                trend: if self.base_signal > 0.5 { "BULLISH" } else { "BEARISH" }.to_string(),
            }),
        };

        let proposal = Proposal {
            id: format!("prop_{}", millis),
            action: action.to_string(),
            asset: "BTC".to_string(),
            reasoning: format!(
                "Polymarket odds {:.2} ({} 1h), X sentiment {} ({:.2}), Nautilus {} signal ({:.2}). Risk-adjusted confidence: {:.0}%.",
                self.base_odds,
                pct(delta_1h),
                sentiment.to_lowercase(),
                self.base_sentiment,
                position.to_lowercase(),
                self.base_signal,
                confidence * 100.0,
            ),
            risk_level: ["LOW", "MEDIUM", "MEDIUM", "HIGH"]
                .choose(rng)
                .copied()
                .unwrap_or("MEDIUM")
                .to_string(),
            expected_return: (action != "HOLD")
                .then(|| round_to(-0.02 + rng.gen::<f64>() * 0.1, 3)),
            confidence,
            status: [
                ProposalStatus::Active,
                ProposalStatus::PendingApproval,
                ProposalStatus::PendingApproval,
            ]
            .choose(rng)
            .copied()
            .unwrap_or(ProposalStatus::PendingApproval),
            created_at: Some(now),
            human_decision: None,
        };

        let events = (0..8i64)
            .map(|i| ContextEvent {
                id: format!("evt_{}", i),
                timestamp: now - Duration::minutes(i * 15),
                kind: ["X_SENTIMENT_SHIFT", "POLYMARKET_ODDS_CHANGE", "NAUTILUS_SIGNAL"]
                    [(i % 3) as usize]
                    .to_string(),
                description: format!("Market event {}: signal detected", i),
                relevance_decay: round_to(1.0 - i as f64 * 0.1, 2),
                impact: match i {
                    0..=2 => "HIGH",
                    3..=5 => "MEDIUM",
                    _ => "LOW",
                }
                .to_string(),
            })
            .collect();

        let mut extra = Map::new();
        extra.insert(
            "data_sources".to_string(),
            json!({
                "polymarket": {"type": "LIVE", "last_update": now, "status": "active"},
                "x_intelligence": {"type": "LIVE", "last_update": now, "status": "active"},
                "nautilus": {"type": "LIVE", "last_update": now, "status": "active"},
            }),
        );

        Snapshot {
            meta: Some(Meta {
                timestamp: now,
                agent_status: ["REASONING", "ANALYZING", "MONITORING"]
                    .choose(rng)
                    .copied()
                    .unwrap_or("REASONING")
                    .to_string(),
                context_window_hours: Some(8),
                total_events_tracked: self.event_counter,
                system_status: "LIVE".to_string(),
                sync_timestamp: Some(now),
            }),
            agent_thoughts: vec![thought],
            triangulation_matrix: Some(matrix),
            perception: Some(Perception {
                polymarket: Some(PolymarketPerception {
                    event: "BTC price prediction market".to_string(),
                    current_odds: odds,
                    delta_1h: round_to(delta_1h, 3),
                    delta_24h: round_to(delta_24h, 3),
                    volume_24h: rng.gen_range(800_000.0..2_000_000.0f64).floor(),
                    liquidity: rng.gen_range(2_500_000.0..4_500_000.0f64).floor(),
                    last_trade: Some(now),
                    history: vec![OddsPoint {
                        timestamp: now,
                        odds,
                    }],
                }),
                x_intelligence: vec![signal],
                nautilus: Some(nautilus),
            }),
            execution: Some(Execution {
                current_proposal: Some(proposal),
                proposal_history: Vec::new(),
            }),
            context_memory: Some(ContextMemory { events }),
            extra,
        }
    }
}

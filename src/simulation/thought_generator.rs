//! Fabricated reasoning entries for demo auto-play.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Map, Value};

use crate::domain::{ReasoningEntry, ThoughtId};

const CATEGORIES: [&str; 3] = ["TRIANGULATION", "SENTIMENT_ANALYSIS", "RISK_ASSESSMENT"];

const REASONINGS: [&str; 5] = [
    "Detecting strong correlation between Polymarket odds surge and X sentiment spike. Technical confirmation pending.",
    "Market sentiment shifting bullish. High-impact accounts showing 85% positive conviction.",
    "Volatility spike detected. Safety protocols engaged. Overriding aggressive signals.",
    "Cross-source validation complete. All perception channels aligned. High confidence signal.",
    "Nautilus Keltner breakout confirmed. Polymarket odds at 72%. Executing position increase.",
];

/// Produces one fabricated thought per call with strictly increasing ids
#[derive(Debug, Default)]
pub struct DemoThoughtGenerator {
    last_id_ms: i64,
}

impl DemoThoughtGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate<R: Rng + ?Sized>(&mut self, rng: &mut R, now: DateTime<Utc>) -> ReasoningEntry {
        let id_ms = now.timestamp_millis().max(self.last_id_ms + 1);
        self.last_id_ms = id_ms;

        let kind = CATEGORIES.choose(rng).copied().unwrap_or(CATEGORIES[0]);
        let reasoning = REASONINGS.choose(rng).copied().unwrap_or(REASONINGS[0]);

        let mut inputs = Map::new();
        inputs.insert(
            "polymarket_delta".to_string(),
            rounded(rng.gen_range(0.0..0.05), 3),
        );
        inputs.insert(
            "x_sentiment_current".to_string(),
            rounded(rng.gen_range(0.6..0.9), 2),
        );
        inputs.insert(
            "nautilus_signal_strength".to_string(),
            rounded(rng.gen_range(0.3..0.8), 2),
        );

        ReasoningEntry {
            id: ThoughtId::Text(format!("demo_{}", id_ms)),
            timestamp: now,
            kind: kind.to_string(),
            reasoning: reasoning.to_string(),
            confidence: rng.gen_range(0.6..0.95),
            inputs,
            human_feedback: None,
        }
    }
}

fn rounded(value: f64, places: i32) -> Value {
    let scale = 10f64.powi(places);
    json!((value * scale).round() / scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_ids_strictly_increase_within_same_millisecond() {
        let mut generator = DemoThoughtGenerator::new();
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc::now();

        let a = generator.generate(&mut rng, now);
        let b = generator.generate(&mut rng, now);
        let c = generator.generate(&mut rng, now);
        assert!(b.id > a.id);
        assert!(c.id > b.id);
    }

    #[test]
    fn test_fields_within_documented_ranges() {
        let mut generator = DemoThoughtGenerator::new();
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..200 {
            let thought = generator.generate(&mut rng, Utc::now());
            assert!((0.6..0.95).contains(&thought.confidence));
            assert!(CATEGORIES.contains(&thought.kind.as_str()));
            assert!(REASONINGS.contains(&thought.reasoning.as_str()));
            assert!(thought.human_feedback.is_none());

            let sentiment = thought.inputs["x_sentiment_current"].as_f64().unwrap();
            assert!((0.6..=0.9).contains(&sentiment));
            let delta = thought.inputs["polymarket_delta"].as_f64().unwrap();
            assert!((0.0..=0.05).contains(&delta));
            let signal = thought.inputs["nautilus_signal_strength"].as_f64().unwrap();
            assert!((0.3..=0.8).contains(&signal));
        }
    }

    #[test]
    fn test_id_carries_demo_prefix() {
        let mut generator = DemoThoughtGenerator::new();
        let mut rng = StdRng::seed_from_u64(3);
        let thought = generator.generate(&mut rng, Utc::now());
        assert!(thought.id.to_string().starts_with("demo_"));
    }
}

//! Per-tick evolution of a snapshot while demo mode is active.
//!
//! `tick` is a pure transform: it reads the previous snapshot and builds a new
//! one section by section, so the per-field rules below can be checked
//! directly against its output.
//!
//! - odds walk within their bounds, `delta_1h` is `new_odds - last history odds`
//! - 24h volume scales by a multiplicative jitter around 1.0
//! - social signal scores walk, their text never changes
//! - price moves additively, `unrealized_pnl` is always `current - entry`,
//!   `daily_pnl` accumulates a fraction of each move
//! - the three correlations walk independently and `overall_alignment` is
//!   recomputed as their mean
//! - context events are occasionally prepended, capped, and decay each tick

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use super::random_walk::walk_within;
use crate::config::SimulatorConfig;
use crate::domain::{
    ContextEvent, ContextMemory, Meta, NautilusSnapshot, Perception, PolymarketPerception,
    Snapshot, SocialSignal, TriangulationMatrix,
};

const EVENT_TYPES: [&str; 4] = [
    "POLYMARKET_SPIKE",
    "X_SENTIMENT_SHIFT",
    "VOLATILITY_SPIKE",
    "NAUTILUS_SIGNAL",
];

const IMPACTS: [&str; 3] = ["LOW", "MEDIUM", "HIGH"];

/// Evolves snapshots according to [`SimulatorConfig`]
#[derive(Debug, Clone, Default)]
pub struct LiveDataSimulator {
    config: SimulatorConfig,
}

impl LiveDataSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Tick period for a speed multiplier. Speed changes frequency only,
    /// never the per-tick magnitude.
    pub fn interval(&self, speed: u8) -> Duration {
        Duration::from_millis((self.config.tick_ms / u64::from(speed.max(1))).max(1))
    }

    /// Produce the next snapshot. An absent previous snapshot yields `None`.
    pub fn tick<R: Rng + ?Sized>(
        &self,
        previous: Option<&Snapshot>,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Option<Snapshot> {
        let previous = previous?;

        Some(Snapshot {
            meta: previous.meta.as_ref().map(|meta| refresh_meta(meta, now)),
            agent_thoughts: previous.agent_thoughts.clone(),
            triangulation_matrix: previous
                .triangulation_matrix
                .as_ref()
                .map(|matrix| self.step_matrix(matrix, rng)),
            perception: previous
                .perception
                .as_ref()
                .map(|perception| self.step_perception(perception, rng)),
            execution: previous.execution.clone(),
            context_memory: previous
                .context_memory
                .as_ref()
                .map(|memory| self.step_context(memory, rng, now)),
            extra: previous.extra.clone(),
        })
    }

    fn step_perception<R: Rng + ?Sized>(&self, perception: &Perception, rng: &mut R) -> Perception {
        Perception {
            polymarket: perception
                .polymarket
                .as_ref()
                .map(|pm| self.step_polymarket(pm, rng)),
            x_intelligence: perception
                .x_intelligence
                .iter()
                .map(|signal| self.step_signal(signal, rng))
                .collect(),
            nautilus: perception
                .nautilus
                .as_ref()
                .map(|n| self.step_nautilus(n, rng)),
        }
    }

    fn step_polymarket<R: Rng + ?Sized>(
        &self,
        pm: &PolymarketPerception,
        rng: &mut R,
    ) -> PolymarketPerception {
        let current_odds = walk_within(rng, pm.current_odds, &self.config.odds);
        let reference = pm
            .history
            .last()
            .map(|point| point.odds)
            .unwrap_or(pm.current_odds);
        let jitter = 1.0 - self.config.volume_jitter + rng.gen::<f64>() * 2.0 * self.config.volume_jitter;

        PolymarketPerception {
            current_odds,
            delta_1h: current_odds - reference,
            volume_24h: (pm.volume_24h * jitter).floor().max(0.0),
            ..pm.clone()
        }
    }

    fn step_signal<R: Rng + ?Sized>(&self, signal: &SocialSignal, rng: &mut R) -> SocialSignal {
        SocialSignal {
            sentiment_score: walk_within(rng, signal.sentiment_score, &self.config.sentiment),
            agent_relevance_score: walk_within(
                rng,
                signal.agent_relevance_score,
                &self.config.relevance,
            ),
            ..signal.clone()
        }
    }

    fn step_nautilus<R: Rng + ?Sized>(&self, n: &NautilusSnapshot, rng: &mut R) -> NautilusSnapshot {
        let price_change = (rng.gen::<f64>() - 0.5) * self.config.price_step;
        let current_price = n.current_price + price_change;

        NautilusSnapshot {
            current_price,
            unrealized_pnl: current_price - n.entry_price,
            daily_pnl: n.daily_pnl + price_change * self.config.daily_pnl_factor,
            signal_strength: walk_within(rng, n.signal_strength, &self.config.signal_strength),
            ..n.clone()
        }
    }

    fn step_matrix<R: Rng + ?Sized>(
        &self,
        matrix: &TriangulationMatrix,
        rng: &mut R,
    ) -> TriangulationMatrix {
        let polymarket_x = walk_within(rng, matrix.polymarket_x_correlation, &self.config.polymarket_x);
        let polymarket_nautilus = walk_within(
            rng,
            matrix.polymarket_nautilus_correlation,
            &self.config.polymarket_nautilus,
        );
        let x_nautilus = walk_within(rng, matrix.x_nautilus_correlation, &self.config.x_nautilus);

        TriangulationMatrix::from_correlations(polymarket_x, polymarket_nautilus, x_nautilus)
    }

    fn step_context<R: Rng + ?Sized>(
        &self,
        memory: &ContextMemory,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> ContextMemory {
        let mut events = Vec::with_capacity(self.config.max_events);

        if rng.gen::<f64>() < self.config.event_probability {
            events.push(synthesize_event(rng, now));
        }
        events.extend(memory.events.iter().cloned());
        events.truncate(self.config.max_events);

        for event in &mut events {
            event.relevance_decay =
                (event.relevance_decay * self.config.decay_factor).max(self.config.decay_floor);
        }

        ContextMemory { events }
    }
}

fn refresh_meta(meta: &Meta, now: DateTime<Utc>) -> Meta {
    Meta {
        timestamp: now,
        sync_timestamp: Some(now),
        ..meta.clone()
    }
}

fn synthesize_event<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> ContextEvent {
    let kind = EVENT_TYPES.choose(rng).copied().unwrap_or(EVENT_TYPES[0]);
    let impact = IMPACTS.choose(rng).copied().unwrap_or(IMPACTS[0]);

    ContextEvent {
        id: format!("evt_{}", now.timestamp_millis()),
        timestamp: now,
        kind: kind.to_string(),
        description: format!("{} detected", kind.replace('_', " ").to_lowercase()),
        relevance_decay: 1.0,
        impact: impact.to_string(),
    }
}

//! Demo-mode data fabrication
//!
//! Bounded random walks, a per-tick snapshot evolver, a seed generator that
//! builds whole snapshots from an explicit state, and a fabricated-thought
//! generator for auto-play.

pub mod live_data;
pub mod random_walk;
pub mod seed;
pub mod thought_generator;

pub use live_data::LiveDataSimulator;
pub use random_walk::{walk, walk_relative, walk_within};
pub use seed::SimulatorState;
pub use thought_generator::DemoThoughtGenerator;

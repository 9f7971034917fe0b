pub mod cli;
pub mod config;
pub mod demo;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod polling;
pub mod runtime;
pub mod services;
pub mod simulation;

pub use config::AppConfig;
pub use demo::{DemoKey, DemoModeController, DemoSpeed, DemoState};
pub use domain::{Decision, Feedback, ReasoningEntry, Snapshot, ThoughtId};
pub use error::{DecisifyError, Result};
pub use persistence::{DecisionStore, JsonFileStore, MemoryStore};
pub use polling::{DataOrigin, DataPoller, HttpSnapshotSource, SnapshotSource};
pub use runtime::{DashboardCommand, DashboardRuntime, DashboardView, RuntimeHandle};
pub use services::StatusServer;
pub use simulation::{DemoThoughtGenerator, LiveDataSimulator, SimulatorState};

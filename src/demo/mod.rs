//! Demo mode: presentation controller and keyboard shortcuts

pub mod controller;
pub mod keys;

pub use controller::{DemoModeController, DemoSpeed, DemoState, DemoTransition};
pub use keys::{spawn_key_reader, DemoKey};

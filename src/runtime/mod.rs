//! Dashboard runtime: the single scheduler loop and its command surface

pub mod command;
pub mod dashboard;

pub use command::{DashboardCommand, DashboardView};
pub use dashboard::{DashboardRuntime, RuntimeHandle};

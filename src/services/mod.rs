pub mod status_server;

pub use status_server::{router, HealthResponse, StatusServer, StatusState, THOUGHT_HISTORY};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shortest period that stays non-zero when divided by the fastest demo speed (3x)
pub const MIN_PERIOD_MS: u64 = 3;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub demo: DemoConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// Primary snapshot endpoint
    #[serde(default = "default_primary_url")]
    pub primary_url: String,
    /// Fallback resource when the primary is unreachable (URL or file path)
    #[serde(default = "default_fallback")]
    pub fallback: Option<String>,
    /// Polling interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
    /// Request timeout in milliseconds, covering primary and fallback together
    #[serde(default = "default_request_timeout")]
    pub timeout_ms: u64,
    /// Delay between successive reveals of newly arrived thoughts
    #[serde(default = "default_stagger")]
    pub stagger_ms: u64,
    /// Consecutive failures tolerated before the loading state gives way to the error state
    #[serde(default = "default_max_silent_failures")]
    pub max_silent_failures: u32,
}

fn default_primary_url() -> String {
    "http://localhost:8000/status".to_string()
}

fn default_fallback() -> Option<String> {
    Some("data.json".to_string())
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_request_timeout() -> u64 {
    5000
}

fn default_stagger() -> u64 {
    2000
}

fn default_max_silent_failures() -> u32 {
    3
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            primary_url: default_primary_url(),
            fallback: default_fallback(),
            interval_ms: default_poll_interval(),
            timeout_ms: default_request_timeout(),
            stagger_ms: default_stagger(),
            max_silent_failures: default_max_silent_failures(),
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }
}

/// Range and per-tick volatility of a random-walked field
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct WalkBounds {
    pub min: f64,
    pub max: f64,
    pub volatility: f64,
}

impl WalkBounds {
    pub const fn new(min: f64, max: f64, volatility: f64) -> Self {
        Self {
            min,
            max,
            volatility,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Tick period at 1x speed in milliseconds
    pub tick_ms: u64,
    pub odds: WalkBounds,
    /// Multiplicative jitter applied to 24h volume (0.05 = +/-5%)
    pub volume_jitter: f64,
    pub sentiment: WalkBounds,
    pub relevance: WalkBounds,
    /// Full width of the uniform additive price step
    pub price_step: f64,
    /// Share of each price change accumulated into daily P&L
    pub daily_pnl_factor: f64,
    pub signal_strength: WalkBounds,
    pub polymarket_x: WalkBounds,
    pub polymarket_nautilus: WalkBounds,
    pub x_nautilus: WalkBounds,
    /// Probability per tick of synthesizing a context event
    pub event_probability: f64,
    /// Maximum context events retained
    pub max_events: usize,
    /// Per-tick relevance decay multiplier
    pub decay_factor: f64,
    /// Relevance decay never drops below this
    pub decay_floor: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1200,
            odds: WalkBounds::new(0.5, 0.85, 0.05),
            volume_jitter: 0.05,
            sentiment: WalkBounds::new(0.2, 0.95, 0.05),
            relevance: WalkBounds::new(0.5, 0.98, 0.04),
            price_step: 300.0,
            daily_pnl_factor: 0.2,
            signal_strength: WalkBounds::new(0.2, 0.8, 0.1),
            polymarket_x: WalkBounds::new(0.3, 0.95, 0.05),
            polymarket_nautilus: WalkBounds::new(0.3, 0.9, 0.05),
            x_nautilus: WalkBounds::new(0.3, 0.85, 0.06),
            event_probability: 0.35,
            max_events: 8,
            decay_factor: 0.98,
            decay_floor: 0.3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Auto-play generator period at 1x speed in milliseconds
    pub autoplay_base_ms: u64,
    /// Thinking pulse after a generated thought
    pub thinking_ms: u64,
    /// Thinking pulse after real thoughts are revealed
    pub reveal_thinking_ms: u64,
    /// Length cap of the rolling demo thought log
    pub max_demo_thoughts: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            autoplay_base_ms: 4000,
            thinking_ms: 2000,
            reveal_thinking_ms: 3000,
            max_demo_thoughts: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    /// JSON file backing the decision store; in-memory when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Status server port
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Interval between regenerated snapshots in milliseconds
    #[serde(default = "default_refresh")]
    pub refresh_ms: u64,
}

fn default_server_port() -> u16 {
    8000
}

fn default_refresh() -> u64 {
    2000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            refresh_ms: default_refresh(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("DECISIFY_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (DECISIFY_POLLER__INTERVAL_MS, etc.)
            .add_source(
                Environment::with_prefix("DECISIFY")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.poller.interval_ms == 0 {
            errors.push("poller.interval_ms must be positive".to_string());
        }
        if self.poller.timeout_ms == 0 {
            errors.push("poller.timeout_ms must be positive".to_string());
        }
        if self.simulator.tick_ms < MIN_PERIOD_MS {
            errors.push(format!("simulator.tick_ms must be at least {MIN_PERIOD_MS}"));
        }
        if self.demo.autoplay_base_ms < MIN_PERIOD_MS {
            errors.push(format!("demo.autoplay_base_ms must be at least {MIN_PERIOD_MS}"));
        }

        let sim = &self.simulator;
        let walks = [
            ("odds", sim.odds),
            ("sentiment", sim.sentiment),
            ("relevance", sim.relevance),
            ("signal_strength", sim.signal_strength),
            ("polymarket_x", sim.polymarket_x),
            ("polymarket_nautilus", sim.polymarket_nautilus),
            ("x_nautilus", sim.x_nautilus),
        ];
        for (name, bounds) in walks {
            if bounds.min > bounds.max {
                errors.push(format!(
                    "simulator.{name}: min {} exceeds max {}",
                    bounds.min, bounds.max
                ));
            }
            if bounds.volatility < 0.0 {
                errors.push(format!("simulator.{name}: volatility must be non-negative"));
            }
        }

        if !(0.0..=1.0).contains(&sim.event_probability) {
            errors.push("simulator.event_probability must be between 0 and 1".to_string());
        }
        if !(0.0..1.0).contains(&sim.decay_factor) {
            errors.push("simulator.decay_factor must be in [0, 1)".to_string());
        }
        if !(0.0..1.0).contains(&sim.volume_jitter) {
            errors.push("simulator.volume_jitter must be in [0, 1)".to_string());
        }
        if sim.max_events == 0 {
            errors.push("simulator.max_events must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poller.interval(), Duration::from_secs(2));
        assert_eq!(config.poller.timeout(), Duration::from_secs(5));
        assert_eq!(config.poller.stagger(), Duration::from_secs(2));
        assert_eq!(config.poller.max_silent_failures, 3);
        assert_eq!(config.simulator.max_events, 8);
        assert_eq!(config.demo.max_demo_thoughts, 20);
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut config = AppConfig::default();
        config.simulator.odds = WalkBounds::new(0.9, 0.1, 0.05);
        config.simulator.event_probability = 1.5;
        config.poller.interval_ms = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("odds")));
    }

    #[test]
    fn test_periods_too_short_for_fastest_speed_are_rejected() {
        let mut config = AppConfig::default();
        config.demo.autoplay_base_ms = 2;
        config.simulator.tick_ms = 1;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("demo.autoplay_base_ms")));
        assert!(errors.iter().any(|e| e.contains("simulator.tick_ms")));

        config.demo.autoplay_base_ms = MIN_PERIOD_MS;
        config.simulator.tick_ms = MIN_PERIOD_MS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_missing_dir_uses_defaults() {
        let config = AppConfig::load_from("/nonexistent/decisify-config").unwrap();
        assert_eq!(config.poller.primary_url, "http://localhost:8000/status");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.server.port, 8000);
    }
}

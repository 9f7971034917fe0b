//! Demo mode state machine
//!
//! Owns demo mode, auto-play, speed and fullscreen, the rolling log of
//! generated thoughts and the thinking pulses. Timers are plain deadlines
//! that the runtime loop drains through [`DemoModeController::fire_due`].

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use super::keys::DemoKey;
use crate::config::DemoConfig;
use crate::domain::ReasoningEntry;
use crate::simulation::DemoThoughtGenerator;

/// Demo mode states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DemoState {
    Off,
    OnPaused,
    OnPlaying,
}

impl DemoState {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, DemoState::Off)
    }
}

/// Playback speed multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DemoSpeed {
    #[default]
    X1,
    X2,
    X3,
}

impl DemoSpeed {
    pub fn factor(&self) -> u8 {
        match self {
            DemoSpeed::X1 => 1,
            DemoSpeed::X2 => 2,
            DemoSpeed::X3 => 3,
        }
    }
}

/// What a controller input did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoTransition {
    /// OFF -> ON_PAUSED
    Enabled,
    /// ON_* -> OFF; all demo timers were cancelled
    Disabled,
    AutoPlayStarted,
    AutoPlayStopped,
    SpeedChanged(DemoSpeed),
    FullscreenChanged(bool),
    Quit,
    Ignored,
}

pub struct DemoModeController {
    config: DemoConfig,
    state: DemoState,
    speed: DemoSpeed,
    fullscreen: bool,
    generator: DemoThoughtGenerator,
    /// Newest first, capped at `max_demo_thoughts`
    demo_thoughts: Vec<ReasoningEntry>,
    next_autoplay: Option<Instant>,
    pulses: Vec<Instant>,
}

impl DemoModeController {
    pub fn new(config: DemoConfig) -> Self {
        Self {
            config,
            state: DemoState::Off,
            speed: DemoSpeed::X1,
            fullscreen: false,
            generator: DemoThoughtGenerator::new(),
            demo_thoughts: Vec::new(),
            next_autoplay: None,
            pulses: Vec::new(),
        }
    }

    pub fn state(&self) -> DemoState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    pub fn speed(&self) -> DemoSpeed {
        self.speed
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Whether any thinking pulse is active
    pub fn is_thinking(&self) -> bool {
        !self.pulses.is_empty()
    }

    pub fn demo_thoughts(&self) -> &[ReasoningEntry] {
        &self.demo_thoughts
    }

    /// Auto-play period at the current speed
    pub fn autoplay_interval(&self) -> Duration {
        Duration::from_millis((self.config.autoplay_base_ms / u64::from(self.speed.factor())).max(1))
    }

    pub fn next_autoplay_at(&self) -> Option<Instant> {
        self.next_autoplay
    }

    /// Earliest pending demo deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pulses
            .iter()
            .copied()
            .chain(self.next_autoplay)
            .min()
    }

    pub fn handle_key(&mut self, key: DemoKey, now: Instant) -> DemoTransition {
        match key.resolve(self.is_enabled()) {
            DemoKey::ToggleDemo => self.toggle_demo(),
            DemoKey::ToggleAutoPlay => self.toggle_autoplay(now),
            DemoKey::ToggleFullscreen => self.toggle_fullscreen(),
            DemoKey::SetSpeed(speed) => self.set_speed(speed, now),
            DemoKey::Quit => DemoTransition::Quit,
            DemoKey::Space | DemoKey::None => DemoTransition::Ignored,
        }
    }

    pub fn toggle_demo(&mut self) -> DemoTransition {
        if self.is_enabled() {
            self.disable()
        } else {
            self.enable()
        }
    }

    pub fn enable(&mut self) -> DemoTransition {
        if self.is_enabled() {
            return DemoTransition::Ignored;
        }
        self.state = DemoState::OnPaused;
        info!("Demo mode enabled");
        DemoTransition::Enabled
    }

    /// Leave demo mode, cancelling the generator and every pulse
    pub fn disable(&mut self) -> DemoTransition {
        if !self.is_enabled() {
            return DemoTransition::Ignored;
        }
        self.state = DemoState::Off;
        self.next_autoplay = None;
        self.pulses.clear();
        info!("Demo mode disabled");
        DemoTransition::Disabled
    }

    /// Start or stop auto-play. Ignored while demo mode is off.
    pub fn toggle_autoplay(&mut self, now: Instant) -> DemoTransition {
        match self.state {
            DemoState::Off => {
                debug!("Auto-play toggle ignored outside demo mode");
                DemoTransition::Ignored
            }
            DemoState::OnPaused => {
                self.state = DemoState::OnPlaying;
                self.next_autoplay = Some(now + self.autoplay_interval());
                debug!("Auto-play started every {:?}", self.autoplay_interval());
                DemoTransition::AutoPlayStarted
            }
            DemoState::OnPlaying => {
                self.state = DemoState::OnPaused;
                self.next_autoplay = None;
                self.pulses.clear();
                debug!("Auto-play stopped");
                DemoTransition::AutoPlayStopped
            }
        }
    }

    /// Change speed. A running generator restarts its period at the new speed.
    pub fn set_speed(&mut self, speed: DemoSpeed, now: Instant) -> DemoTransition {
        if speed == self.speed {
            return DemoTransition::Ignored;
        }
        self.speed = speed;
        if self.next_autoplay.is_some() {
            self.next_autoplay = Some(now + self.autoplay_interval());
        }
        debug!("Demo speed set to {}x", speed.factor());
        DemoTransition::SpeedChanged(speed)
    }

    pub fn toggle_fullscreen(&mut self) -> DemoTransition {
        self.fullscreen = !self.fullscreen;
        DemoTransition::FullscreenChanged(self.fullscreen)
    }

    /// Start a thinking pulse for revealed real thoughts
    pub fn pulse_for_reveal(&mut self, now: Instant) {
        self.pulses
            .push(now + Duration::from_millis(self.config.reveal_thinking_ms));
    }

    /// Run every due timer. Returns how many thoughts were generated.
    pub fn fire_due<R: Rng + ?Sized>(&mut self, rng: &mut R, now: Instant) -> usize {
        self.pulses.retain(|deadline| *deadline > now);

        let mut generated = 0;
        while let Some(deadline) = self.next_autoplay {
            if deadline > now {
                break;
            }
            let thought = self.generator.generate(rng, Utc::now());
            debug!("Generated demo thought {}", thought.id);
            self.demo_thoughts.insert(0, thought);
            self.demo_thoughts.truncate(self.config.max_demo_thoughts);
            self.pulses
                .push(now + Duration::from_millis(self.config.thinking_ms));
            self.next_autoplay = Some(deadline + self.autoplay_interval());
            generated += 1;
        }
        generated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn controller() -> DemoModeController {
        DemoModeController::new(DemoConfig::default())
    }

    #[test]
    fn test_state_machine() {
        let mut demo = controller();
        let now = Instant::now();
        assert_eq!(demo.state(), DemoState::Off);

        assert_eq!(demo.toggle_autoplay(now), DemoTransition::Ignored);
        assert_eq!(demo.state(), DemoState::Off);

        assert_eq!(demo.toggle_demo(), DemoTransition::Enabled);
        assert_eq!(demo.state(), DemoState::OnPaused);
        assert_eq!(demo.toggle_autoplay(now), DemoTransition::AutoPlayStarted);
        assert_eq!(demo.state(), DemoState::OnPlaying);
        assert_eq!(demo.toggle_autoplay(now), DemoTransition::AutoPlayStopped);
        assert_eq!(demo.state(), DemoState::OnPaused);

        demo.toggle_autoplay(now);
        assert_eq!(demo.toggle_demo(), DemoTransition::Disabled);
        assert_eq!(demo.state(), DemoState::Off);
        assert!(demo.next_deadline().is_none());
    }

    #[test]
    fn test_autoplay_interval_scales_with_speed() {
        let mut demo = controller();
        let now = Instant::now();
        assert_eq!(demo.autoplay_interval(), Duration::from_millis(4000));

        demo.enable();
        demo.toggle_autoplay(now);
        assert_eq!(
            demo.set_speed(DemoSpeed::X2, now),
            DemoTransition::SpeedChanged(DemoSpeed::X2)
        );
        assert_eq!(demo.next_autoplay_at(), Some(now + Duration::from_millis(2000)));
        demo.set_speed(DemoSpeed::X3, now);
        assert_eq!(demo.autoplay_interval(), Duration::from_millis(1333));
    }

    #[test]
    fn test_generator_fires_and_pulses() {
        let mut demo = controller();
        let mut rng = StdRng::seed_from_u64(7);
        let t0 = Instant::now();
        demo.enable();
        demo.toggle_autoplay(t0);

        assert_eq!(demo.fire_due(&mut rng, t0 + Duration::from_millis(3999)), 0);
        let fired_at = t0 + Duration::from_millis(4000);
        assert_eq!(demo.fire_due(&mut rng, fired_at), 1);
        assert_eq!(demo.demo_thoughts().len(), 1);
        assert!(demo.is_thinking());

        // Pulse ends 2s later, next generation 4s after the previous one
        assert_eq!(demo.next_deadline(), Some(fired_at + Duration::from_millis(2000)));
        demo.fire_due(&mut rng, fired_at + Duration::from_millis(2000));
        assert!(!demo.is_thinking());
        assert_eq!(demo.next_deadline(), Some(fired_at + Duration::from_millis(4000)));
    }

    #[test]
    fn test_demo_log_capped() {
        let mut demo = controller();
        let mut rng = StdRng::seed_from_u64(1);
        let t0 = Instant::now();
        demo.enable();
        demo.toggle_autoplay(t0);

        let generated = demo.fire_due(&mut rng, t0 + Duration::from_millis(4000 * 25));
        assert_eq!(generated, 25);
        assert_eq!(demo.demo_thoughts().len(), 20);
        let newest = &demo.demo_thoughts()[0].id;
        assert!(demo.demo_thoughts().iter().all(|t| &t.id <= newest));
    }

    #[test]
    fn test_short_base_period_still_advances_at_top_speed() {
        let mut demo = DemoModeController::new(DemoConfig {
            autoplay_base_ms: 2,
            ..DemoConfig::default()
        });
        let mut rng = StdRng::seed_from_u64(5);
        let t0 = Instant::now();
        demo.enable();
        demo.set_speed(DemoSpeed::X3, t0);
        demo.toggle_autoplay(t0);
        assert_eq!(demo.autoplay_interval(), Duration::from_millis(1));

        let generated = demo.fire_due(&mut rng, t0 + Duration::from_millis(10));
        assert_eq!(generated, 10);
        assert!(demo.next_autoplay_at().unwrap() > t0 + Duration::from_millis(10));
    }

    #[test]
    fn test_stopping_autoplay_clears_pulses() {
        let mut demo = controller();
        let mut rng = StdRng::seed_from_u64(3);
        let t0 = Instant::now();
        demo.enable();
        demo.toggle_autoplay(t0);
        demo.fire_due(&mut rng, t0 + Duration::from_millis(4000));
        demo.pulse_for_reveal(t0);
        assert!(demo.is_thinking());

        demo.toggle_autoplay(t0);
        assert!(!demo.is_thinking());
        assert!(demo.next_deadline().is_none());
    }

    #[test]
    fn test_keys_drive_controller() {
        let mut demo = controller();
        let now = Instant::now();
        assert_eq!(demo.handle_key(DemoKey::Space, now), DemoTransition::Ignored);
        assert_eq!(demo.handle_key(DemoKey::ToggleDemo, now), DemoTransition::Enabled);
        assert_eq!(
            demo.handle_key(DemoKey::Space, now),
            DemoTransition::AutoPlayStarted
        );
        assert_eq!(
            demo.handle_key(DemoKey::ToggleFullscreen, now),
            DemoTransition::FullscreenChanged(true)
        );
        assert_eq!(demo.handle_key(DemoKey::Quit, now), DemoTransition::Quit);
    }
}

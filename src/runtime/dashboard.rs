//! Dashboard runtime
//!
//! A single task owns the poller, the simulator and the demo controller. The
//! main `run()` loop uses `tokio::select!` to:
//!   - sleep until the earliest timer deadline (poll, tick, reveal, auto-play, pulse)
//!   - apply commands from handles
//!   - commit fetch results delivered by spawned fetch tasks
//!   - translate terminal key events into demo shortcuts
//!
//! Polling and simulation never run at the same time: demo mode pauses the
//! poller and drives the simulator instead.

use std::sync::Arc;

use chrono::Utc;
use crossterm::event::KeyEvent;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::command::{DashboardCommand, DashboardView};
use crate::config::AppConfig;
use crate::demo::{spawn_key_reader, DemoKey, DemoModeController, DemoTransition};
use crate::domain::Snapshot;
use crate::error::{DecisifyError, Result};
use crate::persistence::DecisionStore;
use crate::polling::{DataPoller, Fetched, SnapshotSource};
use crate::simulation::{LiveDataSimulator, SimulatorState};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Handle to a spawned runtime
pub struct RuntimeHandle {
    commands: mpsc::Sender<DashboardCommand>,
    view: watch::Receiver<DashboardView>,
    task: JoinHandle<()>,
}

impl RuntimeHandle {
    pub async fn send(&self, command: DashboardCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| DecisifyError::Cancelled)
    }

    pub fn sender(&self) -> mpsc::Sender<DashboardCommand> {
        self.commands.clone()
    }

    /// Subscribe to view updates
    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.view.clone()
    }

    pub fn latest(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    /// Ask the loop to stop and wait for it
    pub async fn shutdown(self) -> Result<()> {
        // The loop may already have stopped on its own
        let _ = self.commands.send(DashboardCommand::Shutdown).await;
        self.task
            .await
            .map_err(|e| DecisifyError::Internal(format!("runtime task failed: {}", e)))
    }
}

pub struct DashboardRuntime {
    config: AppConfig,
    poller: DataPoller,
    simulator: LiveDataSimulator,
    seed: SimulatorState,
    demo: DemoModeController,
    sim_data: Option<Snapshot>,
    rng: StdRng,
    keyboard: bool,
    next_poll: Option<Instant>,
    next_tick: Option<Instant>,
    fetch: Option<JoinHandle<()>>,
    fetch_tx: mpsc::Sender<Result<Fetched>>,
    fetch_rx: mpsc::Receiver<Result<Fetched>>,
    view_tx: watch::Sender<DashboardView>,
}

impl DashboardRuntime {
    pub fn new(
        config: AppConfig,
        source: Arc<dyn SnapshotSource>,
        store: Box<dyn DecisionStore>,
    ) -> Self {
        let (fetch_tx, fetch_rx) = mpsc::channel(1);
        let (view_tx, _) = watch::channel(DashboardView::default());

        Self {
            poller: DataPoller::new(source, store, config.poller.clone()),
            simulator: LiveDataSimulator::new(config.simulator.clone()),
            seed: SimulatorState::new(),
            demo: DemoModeController::new(config.demo.clone()),
            config,
            sim_data: None,
            rng: StdRng::from_entropy(),
            keyboard: false,
            next_poll: None,
            next_tick: None,
            fetch: None,
            fetch_tx,
            fetch_rx,
            view_tx,
        }
    }

    /// Use a fixed random source
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Read demo shortcuts from the terminal
    pub fn with_keyboard(mut self, enabled: bool) -> Self {
        self.keyboard = enabled;
        self
    }

    /// Start in demo mode instead of polling
    pub fn start_in_demo(mut self) -> Self {
        self.demo.enable();
        self
    }

    /// Spawn the loop onto the current tokio runtime
    pub fn spawn(self) -> RuntimeHandle {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        let view = self.view_tx.subscribe();
        let task = tokio::spawn(self.run(rx));
        RuntimeHandle {
            commands,
            view,
            task,
        }
    }

    /// Main loop. Returns once a shutdown is requested, every handle is
    /// dropped, or a quit key is pressed.
    pub async fn run(mut self, mut commands: mpsc::Receiver<DashboardCommand>) {
        let mut keys = self.keyboard.then(|| {
            let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
            (spawn_key_reader(tx), rx)
        });

        let now = Instant::now();
        if self.demo.is_enabled() {
            self.enter_demo(now);
        } else {
            self.next_poll = Some(now);
        }
        info!(
            "Dashboard runtime started (demo: {}, primary: {})",
            self.demo.is_enabled(),
            self.config.poller.primary_url
        );
        self.publish();

        loop {
            let deadline = self.next_deadline();

            let flow = tokio::select! {
                _ = sleep_until_opt(deadline) => {
                    self.fire_due(Instant::now());
                    Flow::Continue
                }

                command = commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => Flow::Stop,
                },

                Some(result) = self.fetch_rx.recv() => {
                    self.on_fetched(result);
                    Flow::Continue
                }

                key = recv_key(&mut keys) => match key {
                    Some(key) => self.apply(DashboardCommand::Key(DemoKey::from(key))),
                    None => {
                        debug!("Key reader closed");
                        keys = None;
                        Flow::Continue
                    }
                },
            };

            self.publish();
            if flow == Flow::Stop {
                break;
            }
        }

        if let Some((reader, _)) = keys.take() {
            reader.abort();
        }
        self.teardown();
        self.publish();
        info!("Dashboard runtime stopped");
    }

    fn next_deadline(&self) -> Option<Instant> {
        [
            self.next_poll,
            self.next_tick,
            self.poller.next_reveal_at(),
            self.demo.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn fire_due(&mut self, now: Instant) {
        if self.next_poll.is_some_and(|at| at <= now) {
            self.next_poll = Some(now + self.config.poller.interval());
            self.start_fetch();
        }

        if self.poller.reveal_due(now) > 0 {
            self.demo.pulse_for_reveal(now);
        }

        if self.next_tick.is_some_and(|at| at <= now) {
            self.sim_data = self
                .simulator
                .tick(self.sim_data.as_ref(), &mut self.rng, Utc::now());
            self.next_tick = Some(now + self.simulator.interval(self.demo.speed().factor()));
        }

        self.demo.fire_due(&mut self.rng, now);
    }

    fn start_fetch(&mut self) {
        if self.fetch.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("Previous fetch still in flight, skipping");
            return;
        }
        let fetch = self.poller.fetch_task();
        let tx = self.fetch_tx.clone();
        self.fetch = Some(tokio::spawn(async move {
            let _ = tx.send(fetch.await).await;
        }));
    }

    fn on_fetched(&mut self, result: Result<Fetched>) {
        if self.demo.is_enabled() {
            debug!("Discarding fetch result while demo mode is active");
            return;
        }
        self.poller.commit(result, Instant::now());
    }

    fn apply(&mut self, command: DashboardCommand) -> Flow {
        match command {
            DashboardCommand::SubmitFeedback {
                thought_id,
                feedback,
            } => {
                self.poller.submit_feedback(&thought_id, feedback);
                if let Some(data) = self.sim_data.as_mut() {
                    data.apply_feedback(&thought_id, feedback);
                }
            }
            DashboardCommand::Decide {
                proposal_id,
                decision,
            } => {
                info!("Proposal {} {}", proposal_id, decision);
                self.poller.decide(&proposal_id, decision);
                if let Some(data) = self.sim_data.as_mut() {
                    data.apply_decision(&proposal_id, decision);
                }
            }
            DashboardCommand::ClearNewThoughts => self.poller.clear_new_thoughts(),
            DashboardCommand::Key(key) => return self.on_key(key),
            DashboardCommand::Shutdown => return Flow::Stop,
        }
        Flow::Continue
    }

    fn on_key(&mut self, key: DemoKey) -> Flow {
        let now = Instant::now();
        match self.demo.handle_key(key, now) {
            DemoTransition::Enabled => self.enter_demo(now),
            DemoTransition::Disabled => self.leave_demo(now),
            DemoTransition::SpeedChanged(speed) => {
                if self.next_tick.is_some() {
                    self.next_tick = Some(now + self.simulator.interval(speed.factor()));
                }
            }
            DemoTransition::Quit => return Flow::Stop,
            DemoTransition::AutoPlayStarted
            | DemoTransition::AutoPlayStopped
            | DemoTransition::FullscreenChanged(_)
            | DemoTransition::Ignored => {}
        }
        Flow::Continue
    }

    /// Pause polling and seed the simulator from the last real snapshot
    fn enter_demo(&mut self, now: Instant) {
        self.next_poll = None;
        self.poller.cancel_reveals();
        self.sim_data = match self.poller.snapshot() {
            Some(snapshot) => Some(snapshot.clone()),
            None => Some(self.seed.generate(&mut self.rng, Utc::now())),
        };
        self.next_tick = Some(now + self.simulator.interval(self.demo.speed().factor()));
    }

    /// Stop simulating and resume polling immediately
    fn leave_demo(&mut self, now: Instant) {
        let cancelled = self.poller.cancel_reveals();
        if cancelled > 0 {
            warn!("Cancelled {} pending reveals on leaving demo mode", cancelled);
        }
        self.next_tick = None;
        self.sim_data = None;
        self.next_poll = Some(now);
    }

    fn teardown(&mut self) {
        if let Some(fetch) = self.fetch.take() {
            fetch.abort();
        }
        self.poller.teardown();
        self.demo.disable();
        self.next_poll = None;
        self.next_tick = None;
    }

    fn view(&self) -> DashboardView {
        let demo = self.demo.is_enabled();
        let snapshot = if demo {
            self.sim_data.clone()
        } else {
            self.poller.snapshot().cloned()
        };
        let (thoughts, new_thoughts) = if demo {
            (self.demo.demo_thoughts().to_vec(), self.demo.demo_thoughts().to_vec())
        } else {
            (
                snapshot
                    .as_ref()
                    .map(|s| s.agent_thoughts.clone())
                    .unwrap_or_default(),
                self.poller.new_thoughts().to_vec(),
            )
        };

        DashboardView {
            origin: if demo { None } else { self.poller.origin() },
            snapshot,
            thoughts,
            new_thoughts,
            is_loading: !demo && self.poller.is_loading(),
            error: self.poller.error().map(str::to_string),
            retry_count: self.poller.retry_count(),
            pending_reveals: self.poller.pending_reveals(),
            demo_state: self.demo.state(),
            demo_speed: self.demo.speed(),
            fullscreen: self.demo.is_fullscreen(),
            agent_thinking: self.demo.is_thinking(),
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn recv_key(keys: &mut Option<(JoinHandle<()>, mpsc::Receiver<KeyEvent>)>) -> Option<KeyEvent> {
    match keys {
        Some((_, rx)) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::demo::DemoState;
    use crate::domain::snapshot::fixtures::snapshot_with_ids;
    use crate::domain::{Feedback, ThoughtId};
    use crate::persistence::MemoryStore;
    use crate::polling::source::MockSnapshotSource;
    use crate::polling::DataOrigin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fast_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.poller.interval_ms = 30;
        config.poller.stagger_ms = 10;
        config.simulator.tick_ms = 10;
        config.demo.autoplay_base_ms = 20;
        config.demo.thinking_ms = 5;
        config
    }

    fn growing_source() -> MockSnapshotSource {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut source = MockSnapshotSource::new();
        source.expect_fetch().returning(move || {
            let ids: &[i64] = if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                &[1, 2, 3]
            } else {
                &[1, 2, 3, 4, 5]
            };
            Ok(Fetched {
                snapshot: snapshot_with_ids(ids),
                origin: DataOrigin::Primary,
            })
        });
        source
    }

    async fn wait_for<F>(rx: &mut watch::Receiver<DashboardView>, mut predicate: F) -> DashboardView
    where
        F: FnMut(&DashboardView) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let view = rx.borrow_and_update();
                    if predicate(&view) {
                        return view.clone();
                    }
                }
                rx.changed().await.expect("runtime dropped the view");
            }
        })
        .await
        .expect("condition not reached in time")
    }

    #[tokio::test]
    async fn test_polling_reveals_new_thoughts() {
        let runtime = DashboardRuntime::new(
            fast_config(),
            Arc::new(growing_source()),
            Box::new(MemoryStore::new()),
        )
        .with_rng(StdRng::seed_from_u64(1));
        let handle = runtime.spawn();
        let mut view = handle.subscribe();

        let loaded = wait_for(&mut view, |v| !v.is_loading).await;
        assert_eq!(loaded.origin, Some(DataOrigin::Primary));

        let revealed = wait_for(&mut view, |v| v.new_thoughts.len() == 2).await;
        let ids: Vec<_> = revealed.new_thoughts.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, vec![ThoughtId::Num(5), ThoughtId::Num(4)]);

        handle.send(DashboardCommand::ClearNewThoughts).await.unwrap();
        wait_for(&mut view, |v| v.new_thoughts.is_empty()).await;

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_feedback_command_patches_view() {
        let handle = DashboardRuntime::new(
            fast_config(),
            Arc::new(growing_source()),
            Box::new(MemoryStore::new()),
        )
        .spawn();
        let mut view = handle.subscribe();
        wait_for(&mut view, |v| v.snapshot.is_some()).await;

        handle
            .send(DashboardCommand::SubmitFeedback {
                thought_id: ThoughtId::Num(2),
                feedback: Feedback::Positive,
            })
            .await
            .unwrap();

        wait_for(&mut view, |v| {
            v.thoughts
                .iter()
                .any(|t| t.id == ThoughtId::Num(2) && t.human_feedback == Some(Feedback::Positive))
        })
        .await;
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_demo_mode_simulates_and_generates() {
        let handle = DashboardRuntime::new(
            fast_config(),
            Arc::new(MockSnapshotSource::new()),
            Box::new(MemoryStore::new()),
        )
        .with_rng(StdRng::seed_from_u64(9))
        .start_in_demo()
        .spawn();
        let mut view = handle.subscribe();

        let seeded = wait_for(&mut view, |v| v.snapshot.is_some()).await;
        assert_eq!(seeded.demo_state, DemoState::OnPaused);
        assert!(!seeded.is_loading);

        handle
            .send(DashboardCommand::Key(DemoKey::Space))
            .await
            .unwrap();
        let playing = wait_for(&mut view, |v| v.thoughts.len() >= 2).await;
        assert_eq!(playing.demo_state, DemoState::OnPlaying);
        assert!(playing.thoughts.len() <= 20);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_leaving_demo_cancels_reveals() {
        let handle = DashboardRuntime::new(
            fast_config(),
            Arc::new(growing_source()),
            Box::new(MemoryStore::new()),
        )
        .spawn();
        let mut view = handle.subscribe();
        wait_for(&mut view, |v| !v.is_loading).await;

        handle
            .send(DashboardCommand::Key(DemoKey::ToggleDemo))
            .await
            .unwrap();
        let demo = wait_for(&mut view, |v| v.is_demo()).await;
        assert_eq!(demo.pending_reveals, 0);
        assert!(demo.snapshot.is_some());

        handle
            .send(DashboardCommand::Key(DemoKey::ToggleDemo))
            .await
            .unwrap();
        let off = wait_for(&mut view, |v| !v.is_demo()).await;
        assert!(!off.agent_thinking);

        handle.shutdown().await.unwrap();
    }
}

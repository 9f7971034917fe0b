//! Dashboard runtime polling the bundled status server

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use decisify::config::AppConfig;
use decisify::persistence::MemoryStore;
use decisify::polling::{DataOrigin, HttpSnapshotSource};
use decisify::runtime::{DashboardCommand, DashboardRuntime, DashboardView};
use decisify::services::{router, StatusState};
use decisify::simulation::SimulatorState;
use decisify::{Decision, DemoKey};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::TcpListener;
use tokio::sync::watch;

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
            rx.changed().await.expect("runtime stopped");
        }
    })
    .await
    .expect("condition not reached in time")
}

async fn start_server(state: Arc<StatusState>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{}/status", addr)
}

fn fast_config(primary_url: String) -> AppConfig {
    let mut config = AppConfig::default();
    config.poller.primary_url = primary_url;
    config.poller.fallback = None;
    config.poller.interval_ms = 30;
    config.poller.stagger_ms = 10;
    config.poller.timeout_ms = 1000;
    config.simulator.tick_ms = 10;
    config
}

#[tokio::test]
async fn test_runtime_follows_status_server() {
    let state = Arc::new(StatusState::new());
    let url = start_server(Arc::clone(&state)).await;

    let config = fast_config(url);
    let source = HttpSnapshotSource::new(&config.poller).unwrap();
    let handle = DashboardRuntime::new(config, Arc::new(source), Box::new(MemoryStore::new()))
        .with_rng(StdRng::seed_from_u64(2))
        .spawn();
    let mut view = handle.subscribe();

    // 503 while the server has nothing to serve
    let failing = wait_for(&mut view, |v| v.retry_count > 0).await;
    assert!(failing.error.unwrap().contains("503"));

    let mut generator = SimulatorState::new();
    let mut rng = StdRng::seed_from_u64(4);
    let start = Utc::now();
    state
        .publish(generator.generate(&mut rng, start))
        .await;

    let live = wait_for(&mut view, |v| v.snapshot.is_some()).await;
    assert_eq!(live.origin, Some(DataOrigin::Primary));
    assert!(live.error.is_none());
    assert!(live.new_thoughts.is_empty());

    state
        .publish(generator.generate(&mut rng, start + chrono::Duration::seconds(1)))
        .await;
    let revealed = wait_for(&mut view, |v| v.new_thoughts.len() == 1).await;
    assert_eq!(revealed.thoughts.len(), 2);

    let proposal_id = revealed
        .snapshot
        .as_ref()
        .and_then(|s| s.current_proposal())
        .map(|p| p.id.clone())
        .unwrap();
    handle
        .send(DashboardCommand::Decide {
            proposal_id: proposal_id.clone(),
            decision: Decision::Approved,
        })
        .await
        .unwrap();
    wait_for(&mut view, |v| {
        v.snapshot
            .as_ref()
            .and_then(|s| s.current_proposal())
            .map_or(false, |p| p.id == proposal_id && p.human_decision == Some(Decision::Approved))
    })
    .await;

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_demo_toggle_pauses_polling() {
    let state = Arc::new(StatusState::new());
    let url = start_server(Arc::clone(&state)).await;
    state
        .publish(SimulatorState::new().generate(&mut StdRng::seed_from_u64(8), Utc::now()))
        .await;

    let config = fast_config(url);
    let source = HttpSnapshotSource::new(&config.poller).unwrap();
    let handle = DashboardRuntime::new(config, Arc::new(source), Box::new(MemoryStore::new()))
        .spawn();
    let mut view = handle.subscribe();
    let live = wait_for(&mut view, |v| v.snapshot.is_some()).await;
    let live_odds = live
        .snapshot
        .as_ref()
        .and_then(|s| s.perception.as_ref())
        .and_then(|p| p.polymarket.as_ref())
        .map(|pm| pm.current_odds)
        .unwrap();

    handle.send(DashboardCommand::Key(DemoKey::ToggleDemo)).await.unwrap();
    let simulated = wait_for(&mut view, |v| {
        v.is_demo()
            && v.snapshot
                .as_ref()
                .and_then(|s| s.perception.as_ref())
                .and_then(|p| p.polymarket.as_ref())
                .map_or(false, |pm| pm.current_odds != live_odds)
    })
    .await;
    assert!(simulated.origin.is_none());
    assert!(!simulated.is_loading);

    handle.shutdown().await.unwrap();
}

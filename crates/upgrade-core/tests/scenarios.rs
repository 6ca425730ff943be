use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use upgrade_core::{try_project, UpgradeConfig, UpgradeController, ViewState};
use upgrade_port::{FixedClock, InMemorySimulator, PortError, SimulatorConfig};
use upgrade_query::{MutationPhase, QueryClient, QueryPhase, RetryPolicy};
use upgrade_test_utils::{fixed_now, network_error, trial_expiry, ScriptedPort, PROVIDER_LATENCY};

/// Current view; the malformed-cache fallback must never be reached
fn snapshot(controller: &UpgradeController) -> ViewState {
    let (query, mutation) = controller.snapshot();
    try_project(&query, &mutation, controller.actions())
        .expect("projector fallback reached under normal operation")
}

fn label(view: &ViewState) -> String {
    match view {
        ViewState::Loading => "loading".to_string(),
        ViewState::Failed { error, .. } => format!("failed({error})"),
        ViewState::NotActive {
            transitioning,
            error,
            ..
        } => format!("not-active(transitioning={transitioning}, error={error:?})"),
        ViewState::ActiveTrial { expires_at } => format!("active-trial({expires_at})"),
    }
}

/// Record distinct views until `done` holds for the latest one
async fn drive_until(
    controller: &mut UpgradeController,
    seen: &mut Vec<String>,
    done: impl Fn(&ViewState) -> bool,
) -> ViewState {
    let mut view = snapshot(controller);
    loop {
        let current = label(&view);
        if seen.last() != Some(&current) {
            seen.push(current);
        }
        if done(&view) {
            return view;
        }
        controller.changed().await.expect("status query closed");
        view = snapshot(controller);
    }
}

fn is_settled_not_active(view: &ViewState) -> bool {
    matches!(view, ViewState::NotActive { transitioning: false, .. })
}

fn controller_on(port: Arc<ScriptedPort>) -> UpgradeController {
    UpgradeController::from_config(port, &UpgradeConfig::new()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn scenario_initial_fetch_not_active() {
    let port = Arc::new(ScriptedPort::new());
    let mut controller = controller_on(port.clone());
    let started = Instant::now();

    let mut seen = Vec::new();
    drive_until(&mut controller, &mut seen, is_settled_not_active).await;

    assert_eq!(
        seen,
        vec![
            "loading".to_string(),
            "not-active(transitioning=false, error=None)".to_string(),
        ]
    );
    assert!(started.elapsed() >= PROVIDER_LATENCY);
    assert_eq!(port.fetch_calls(), 1);
    assert_eq!(port.activate_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn scenario_activation_goes_straight_to_active_trial() {
    let port = Arc::new(ScriptedPort::new());
    let mut controller = controller_on(port.clone());
    let mut seen = Vec::new();
    let view = drive_until(&mut controller, &mut seen, is_settled_not_active).await;

    let ViewState::NotActive { actions, .. } = view else {
        panic!("expected not-active view");
    };
    actions.activate_trial.invoke();

    let mut seen = Vec::new();
    let view = drive_until(&mut controller, &mut seen, |view| {
        matches!(view, ViewState::ActiveTrial { .. })
    })
    .await;

    let expires_at = trial_expiry(fixed_now());
    assert_eq!(
        seen,
        vec![
            "not-active(transitioning=true, error=None)".to_string(),
            format!("active-trial({expires_at})"),
        ]
    );
    assert_eq!(view, ViewState::ActiveTrial { expires_at });
    assert_eq!(controller.mutation_state().phase, MutationPhase::Success);
    assert_eq!(port.activate_calls(), 1);
    assert_eq!(port.fetch_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn scenario_fetch_fails_twice_then_failed() {
    let port = Arc::new(
        ScriptedPort::new()
            .then_fetch(Err(network_error()))
            .then_fetch(Err(network_error())),
    );
    let mut controller = controller_on(port.clone());

    let mut seen = Vec::new();
    let view = drive_until(&mut controller, &mut seen, |view| {
        matches!(view, ViewState::Failed { .. })
    })
    .await;

    assert_eq!(
        seen,
        vec!["loading".to_string(), "failed(network error)".to_string()]
    );
    assert_eq!(view.error(), Some("network error"));
    assert_eq!(port.fetch_calls(), 2);

    // A third attempt would succeed; no further call is made on its own.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(port.fetch_calls(), 2);
    assert_eq!(controller.query_state().phase, QueryPhase::Error);
}

#[tokio::test(start_paused = true)]
async fn scenario_manual_retry_recovers() {
    let port = Arc::new(
        ScriptedPort::new()
            .then_fetch(Err(network_error()))
            .then_fetch(Err(network_error())),
    );
    let mut controller = controller_on(port.clone());
    let mut seen = Vec::new();
    let view = drive_until(&mut controller, &mut seen, |view| {
        matches!(view, ViewState::Failed { .. })
    })
    .await;

    let ViewState::Failed { retry, .. } = view else {
        panic!("expected failed view");
    };
    retry.invoke();
    assert_eq!(snapshot(&controller), ViewState::Loading);

    let mut seen = vec!["failed(network error)".to_string()];
    drive_until(&mut controller, &mut seen, is_settled_not_active).await;

    assert_eq!(
        seen,
        vec![
            "failed(network error)".to_string(),
            "loading".to_string(),
            "not-active(transitioning=false, error=None)".to_string(),
        ]
    );
    assert_eq!(port.fetch_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn manual_retry_is_one_attempt_with_its_own_automatic_retry() {
    let port = Arc::new(
        ScriptedPort::new()
            .then_fetch(Err(network_error()))
            .then_fetch(Err(network_error()))
            .then_fetch(Err(PortError::server("still down")))
            .then_fetch(Err(PortError::server("still down"))),
    );
    let mut controller = controller_on(port.clone());
    let mut seen = Vec::new();
    drive_until(&mut controller, &mut seen, |view| {
        matches!(view, ViewState::Failed { .. })
    })
    .await;

    controller.retry().unwrap();
    controller.retry().unwrap();

    let mut seen = Vec::new();
    let view = drive_until(&mut controller, &mut seen, |view| {
        matches!(view, ViewState::Failed { .. })
    })
    .await;

    assert_eq!(view.error(), Some("still down"));
    assert_eq!(port.fetch_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn activation_failure_is_inline_and_recoverable() {
    let port = Arc::new(
        ScriptedPort::new().then_activate(Err(PortError::server("activation refused"))),
    );
    let mut controller = controller_on(port.clone());
    let mut seen = Vec::new();
    drive_until(&mut controller, &mut seen, is_settled_not_active).await;

    controller.activate_trial();
    let mut seen = Vec::new();
    let view = drive_until(&mut controller, &mut seen, |view| {
        matches!(view, ViewState::NotActive { transitioning: false, error: Some(_), .. })
    })
    .await;

    assert_eq!(
        seen,
        vec![
            "not-active(transitioning=true, error=None)".to_string(),
            "not-active(transitioning=false, error=Some(\"activation refused\"))".to_string(),
        ]
    );

    let ViewState::NotActive { actions, .. } = view else {
        panic!("expected not-active view");
    };
    actions.activate_trial.invoke();
    let view = drive_until(&mut controller, &mut Vec::new(), |view| {
        matches!(view, ViewState::ActiveTrial { .. })
    })
    .await;

    assert_eq!(view.status().as_str(), "active-trial");
    assert_eq!(port.activate_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn transitioning_covers_the_whole_activation() {
    let port = Arc::new(ScriptedPort::new());
    let mut controller = controller_on(port.clone());
    drive_until(&mut controller, &mut Vec::new(), is_settled_not_active).await;

    assert!(!snapshot(&controller).is_transitioning());
    controller.activate_trial();
    let started = Instant::now();

    while started.elapsed() < PROVIDER_LATENCY - Duration::from_millis(100) {
        assert!(snapshot(&controller).is_transitioning());
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    tokio::time::sleep(PROVIDER_LATENCY).await;
    let view = snapshot(&controller);
    assert!(!view.is_transitioning());
    assert!(matches!(view, ViewState::ActiveTrial { .. }));
}

#[tokio::test(start_paused = true)]
async fn repeated_activation_while_pending_runs_once() {
    let port = Arc::new(ScriptedPort::new());
    let mut controller = controller_on(port.clone());
    drive_until(&mut controller, &mut Vec::new(), is_settled_not_active).await;

    controller.activate_trial();
    controller.actions().activate_trial.invoke();
    assert!(controller.activate_trial_async().await.is_err());

    drive_until(&mut controller, &mut Vec::new(), |view| {
        matches!(view, ViewState::ActiveTrial { .. })
    })
    .await;
    assert_eq!(port.activate_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn activation_result_is_not_clobbered_by_stale_refetch() {
    let port = Arc::new(ScriptedPort::new());
    let mut controller = controller_on(port.clone());
    drive_until(&mut controller, &mut Vec::new(), is_settled_not_active).await;

    controller.activate_trial();
    tokio::time::sleep(PROVIDER_LATENCY / 2).await;
    controller.retry().unwrap();
    assert_eq!(snapshot(&controller), ViewState::Loading);

    drive_until(&mut controller, &mut Vec::new(), |view| {
        matches!(view, ViewState::ActiveTrial { .. })
    })
    .await;

    tokio::time::sleep(PROVIDER_LATENCY * 2).await;
    assert_eq!(
        snapshot(&controller),
        ViewState::ActiveTrial {
            expires_at: trial_expiry(fixed_now())
        }
    );
    assert_eq!(port.fetch_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn shared_cache_serves_activated_status_to_new_consumers() {
    let port = Arc::new(ScriptedPort::new());
    let client = QueryClient::new(RetryPolicy::default());
    let mut first =
        UpgradeController::new(port.clone(), client.clone(), &UpgradeConfig::new()).unwrap();
    drive_until(&mut first, &mut Vec::new(), is_settled_not_active).await;

    first.activate_trial_async().await.unwrap();

    let second = UpgradeController::new(port.clone(), client, &UpgradeConfig::new()).unwrap();
    assert_eq!(
        snapshot(&second),
        ViewState::ActiveTrial {
            expires_at: trial_expiry(fixed_now())
        }
    );
    assert_eq!(port.fetch_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn simulator_round_trip() {
    let clock = Arc::new(FixedClock(fixed_now()));
    let simulator = Arc::new(InMemorySimulator::with_clock(SimulatorConfig::new(), clock));
    let mut controller =
        UpgradeController::from_config(simulator.clone(), &UpgradeConfig::new()).unwrap();

    let mut seen = Vec::new();
    drive_until(&mut controller, &mut seen, is_settled_not_active).await;
    controller.activate_trial();
    drive_until(&mut controller, &mut seen, |view| {
        matches!(view, ViewState::ActiveTrial { .. })
    })
    .await;

    assert_eq!(
        seen,
        vec![
            "loading".to_string(),
            "not-active(transitioning=false, error=None)".to_string(),
            "not-active(transitioning=true, error=None)".to_string(),
            format!("active-trial({})", trial_expiry(fixed_now())),
        ]
    );

    let mut fresh =
        UpgradeController::from_config(simulator.clone(), &UpgradeConfig::new()).unwrap();
    let view = drive_until(&mut fresh, &mut Vec::new(), |view| {
        !matches!(view, ViewState::Loading)
    })
    .await;
    assert_eq!(view.status().as_str(), "active-trial");
    assert_eq!(simulator.fetch_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn projector_fallback_unreachable_across_lifecycle() {
    let port = Arc::new(
        ScriptedPort::new()
            .then_fetch(Err(network_error()))
            .then_fetch(Err(network_error()))
            .then_activate(Err(network_error())),
    );
    let mut controller = controller_on(port);

    // Every snapshot taken by drive_until asserts the projection is total
    // without falling back.
    let mut seen = Vec::new();
    drive_until(&mut controller, &mut seen, |view| {
        matches!(view, ViewState::Failed { .. })
    })
    .await;
    controller.retry().unwrap();
    drive_until(&mut controller, &mut seen, is_settled_not_active).await;
    controller.activate_trial();
    drive_until(&mut controller, &mut seen, |view| view.error().is_some()).await;
    controller.activate_trial();
    drive_until(&mut controller, &mut seen, |view| {
        matches!(view, ViewState::ActiveTrial { .. })
    })
    .await;

    assert_eq!(seen.len(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn activation_commit_is_never_seen_half_done() {
    let port = Arc::new(ScriptedPort::new().with_latency(Duration::from_millis(5)));
    let controller = Arc::new(controller_on(port));
    while controller.snapshot().0.phase != QueryPhase::Success {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let watcher = Arc::clone(&controller);
    let polling = std::thread::spawn(move || loop {
        let (query, mutation) = watcher.snapshot();
        let active = matches!(
            query.value,
            Some(upgrade_port::UpgradeStatus::ActiveTrial { .. })
        );
        assert!(
            !(active && mutation.phase == MutationPhase::Pending),
            "active trial observed next to a pending activation"
        );
        if active {
            return mutation.phase;
        }
        std::thread::yield_now();
    });

    controller.activate_trial_async().await.unwrap();

    assert_eq!(polling.join().unwrap(), MutationPhase::Success);
}

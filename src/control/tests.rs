use super::*;
use crate::device::{Device, DeviceEnumerator};
use crate::error::{ConfigError, MirrorError, ServiceError};
use crate::notify::{NotificationLevel, Notifier};
use crate::process::MockCommandRunner;
use crate::service::{ServiceAction, ServiceController, ServiceState};
use crate::settings::SettingsLocation;
use crate::store::{ConfigStore, MemoryStore, UciStore};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const STATUS: &str = "/etc/init.d/relay status";
const START: &str = "/etc/init.d/relay start";
const ENABLE: &str = "/etc/init.d/relay enable";
const DEVICES: &str = "adb devices";

fn create_test_surface(runner: &MockCommandRunner, store: &MemoryStore) -> ControlSurface {
    let runner: Arc<MockCommandRunner> = Arc::new(runner.clone());

    ControlSurface::builder()
        .enumerator(DeviceEnumerator::new(runner.clone(), "adb"))
        .controller(ServiceController::new(runner, "/etc/init.d/relay"))
        .store(Arc::new(store.clone()))
        .location(SettingsLocation::new("relay", "config"))
        .notifier(Notifier::new(20))
        .resync_delay(Duration::from_secs(1))
        .build()
        .unwrap()
}

fn listing(ids: &[&str]) -> String {
    let mut output = "List of devices attached\n".to_string();
    for id in ids {
        output.push_str(&format!("{}\tdevice\n", id));
    }
    output
}

fn levels(surface: &ControlSurface) -> Vec<NotificationLevel> {
    surface
        .notifier()
        .recent()
        .into_iter()
        .map(|n| n.level)
        .collect()
}

#[test]
fn test_action_enablement_for_every_state() {
    let running = ActionSet::for_state(ServiceState::Running);
    assert!(!running.start);
    assert!(running.stop && running.restart && running.open);

    for state in [ServiceState::Stopped, ServiceState::Unknown] {
        let actions = ActionSet::for_state(state);
        assert!(actions.start);
        assert!(!actions.stop && !actions.restart && !actions.open);
        assert!(actions.is_enabled(ActionKind::Start));
        assert!(!actions.is_enabled(ActionKind::Open));
    }
}

#[test]
fn test_builder_requires_components() {
    assert!(ControlSurface::builder().build().is_err());
}

#[tokio::test]
async fn test_initial_status_is_unknown() {
    let surface = create_test_surface(&MockCommandRunner::new(), &MemoryStore::new());

    let status = surface.current_status();
    assert_eq!(status.state, ServiceState::Unknown);
    assert!(status.updated_at.is_none());
    assert!(status.actions.start);
}

#[tokio::test]
async fn test_refresh_status_notifies_observers() {
    let runner = MockCommandRunner::new();
    runner.respond(STATUS, 0, "");
    let surface = create_test_surface(&runner, &MemoryStore::new());
    let mut observer = surface.subscribe();

    let snapshot = surface.refresh_status().await;
    assert_eq!(snapshot.state, ServiceState::Running);
    assert_eq!(snapshot.label, "RUNNING");
    assert!(!snapshot.actions.start);

    observer.changed().await.unwrap();
    assert_eq!(observer.borrow().state, ServiceState::Running);
}

#[tokio::test]
async fn test_probe_failure_is_unknown_and_warned_once() {
    let runner = MockCommandRunner::new();
    runner.fail(STATUS, io::ErrorKind::PermissionDenied);
    let surface = create_test_surface(&runner, &MemoryStore::new());

    let first = surface.refresh_status().await;
    let second = surface.refresh_status().await;

    assert_eq!(first.state, ServiceState::Unknown);
    assert!(first.probe_failed);
    assert_eq!(first.label, "STOPPED");
    assert!(second.probe_failed);
    assert_eq!(levels(&surface), vec![NotificationLevel::Warning]);
}

#[tokio::test]
async fn test_confirmed_stop_is_distinct_from_unknown() {
    let runner = MockCommandRunner::new();
    runner.respond(STATUS, 3, "");
    let surface = create_test_surface(&runner, &MemoryStore::new());

    let snapshot = surface.refresh_status().await;
    assert_eq!(snapshot.state, ServiceState::Stopped);
    assert!(!snapshot.probe_failed);
}

#[tokio::test]
async fn test_refresh_devices_is_idempotent_and_keeps_selection() {
    let runner = MockCommandRunner::new();
    runner.respond(DEVICES, 0, &listing(&["ABC123", "XYZ789"]));
    let store = MemoryStore::new();
    let surface = create_test_surface(&runner, &store);

    surface.refresh_devices().await.unwrap();
    surface.select_device(Some("XYZ789")).await.unwrap();

    let first = surface.refresh_devices().await.unwrap();
    let second = surface.refresh_devices().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.selected.as_deref(), Some("XYZ789"));
    assert_eq!(
        second.devices,
        vec![Device::new("ABC123"), Device::new("XYZ789")]
    );
}

#[tokio::test]
async fn test_selection_reverts_to_auto_detect_when_device_disappears() {
    let runner = MockCommandRunner::new();
    runner
        .respond(DEVICES, 0, &listing(&["ABC123"]))
        .respond(DEVICES, 0, &listing(&["OTHER"]));
    let surface = create_test_surface(&runner, &MemoryStore::new());

    surface.refresh_devices().await.unwrap();
    surface.select_device(Some("ABC123")).await.unwrap();

    let options = surface.refresh_devices().await.unwrap();
    assert_eq!(options.selected, None);
    assert_eq!(options.devices, vec![Device::new("OTHER")]);
}

#[tokio::test]
async fn test_refresh_devices_failure_keeps_previous_list() {
    let runner = MockCommandRunner::new();
    runner
        .respond(DEVICES, 0, &listing(&["ABC123"]))
        .respond(DEVICES, 1, "");
    let surface = create_test_surface(&runner, &MemoryStore::new());

    surface.refresh_devices().await.unwrap();
    assert!(surface.refresh_devices().await.is_err());

    assert_eq!(surface.device_options().devices, vec![Device::new("ABC123")]);
    assert_eq!(
        levels(&surface),
        vec![NotificationLevel::Info, NotificationLevel::Warning]
    );
}

#[tokio::test]
async fn test_select_unlisted_device_is_rejected() {
    let runner = MockCommandRunner::new();
    runner.respond(DEVICES, 0, &listing(&["ABC123"]));
    let store = MemoryStore::new();
    let surface = create_test_surface(&runner, &store);
    surface.refresh_devices().await.unwrap();

    assert!(surface.select_device(Some("GHOST")).await.is_err());
    assert_eq!(store.get("relay", "config", "device").await.unwrap(), None);

    surface.select_device(Some("ABC123")).await.unwrap();
    assert_eq!(
        store.get("relay", "config", "device").await.unwrap(),
        Some("ABC123".to_string())
    );

    surface.select_device(None).await.unwrap();
    assert_eq!(
        store.get("relay", "config", "device").await.unwrap(),
        Some(String::new())
    );
}

#[tokio::test]
async fn test_initialize_restores_stored_selection() {
    let runner = MockCommandRunner::new();
    runner
        .respond(DEVICES, 0, &listing(&["ABC123"]))
        .respond(STATUS, 0, "");
    let store = MemoryStore::new();
    store.set("relay", "config", "device", "ABC123").await.unwrap();
    let surface = create_test_surface(&runner, &store);

    surface.initialize().await;

    assert_eq!(surface.device_options().selected.as_deref(), Some("ABC123"));
    assert_eq!(surface.current_status().state, ServiceState::Running);
}

#[tokio::test(start_paused = true)]
async fn test_start_resyncs_status_after_delay() {
    let runner = MockCommandRunner::new();
    runner
        .respond(STATUS, 3, "")
        .respond(STATUS, 0, "")
        .respond(START, 0, "")
        .respond(ENABLE, 0, "");
    let surface = create_test_surface(&runner, &MemoryStore::new());
    surface.refresh_status().await;
    let mut observer = surface.subscribe();
    observer.borrow_and_update();

    let outcome = surface.perform_action(ServiceAction::Start).await;
    assert!(outcome.is_completed());

    // Issuing start says nothing about the state until the next probe
    assert_eq!(surface.current_status().state, ServiceState::Stopped);

    timeout(Duration::from_secs(5), observer.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(surface.current_status().state, ServiceState::Running);
    assert_eq!(runner.call_count(STATUS), 2);
}

#[tokio::test]
async fn test_failed_action_reports_error_and_releases_control() {
    let runner = MockCommandRunner::new();
    runner.respond(START, 1, "").respond(ENABLE, 0, "");
    let surface = create_test_surface(&runner, &MemoryStore::new());

    let outcome = surface.perform_action(ServiceAction::Start).await;
    assert!(matches!(
        outcome,
        ActionOutcome::Failed(ServiceError::ActionFailed {
            action: ServiceAction::Start,
            ..
        })
    ));
    assert!(surface.busy_actions().is_empty());
    assert_eq!(levels(&surface), vec![NotificationLevel::Error]);
    assert_eq!(surface.current_status().state, ServiceState::Unknown);

    // The control is usable again
    runner.reset(START);
    runner.respond(START, 0, "");
    assert!(surface
        .perform_action(ServiceAction::Start)
        .await
        .is_completed());
}

#[tokio::test(start_paused = true)]
async fn test_same_action_is_busy_while_in_flight() {
    let runner = MockCommandRunner::new();
    runner
        .respond(START, 0, "")
        .respond(ENABLE, 0, "")
        .respond(STATUS, 0, "")
        .delay(START, Duration::from_secs(2));
    let surface = create_test_surface(&runner, &MemoryStore::new());

    let (first, second) = tokio::join!(
        surface.perform_action(ServiceAction::Start),
        surface.perform_action(ServiceAction::Start)
    );

    assert_eq!(first, ActionOutcome::Completed);
    assert_eq!(second, ActionOutcome::Busy);
    assert_eq!(runner.call_count(START), 1);
    assert!(surface.busy_actions().is_empty());
}

#[tokio::test]
async fn test_open_url_requires_running_service() {
    let runner = MockCommandRunner::new();
    runner.respond(STATUS, 0, "");
    let store = MemoryStore::new();
    let surface = create_test_surface(&runner, &store);

    assert_eq!(surface.open_url("192.168.1.1").await, None);

    surface.refresh_status().await;
    assert_eq!(
        surface.open_url("192.168.1.1").await.as_deref(),
        Some("http://192.168.1.1:8000")
    );

    store
        .set("relay", "config", "server_port", "9000")
        .await
        .unwrap();
    assert_eq!(
        surface.open_url("router.lan").await.as_deref(),
        Some("http://router.lan:9000")
    );
}

#[tokio::test]
async fn test_update_settings_updates_selection() {
    let runner = MockCommandRunner::new();
    runner.respond(DEVICES, 0, &listing(&["ABC123"]));
    let surface = create_test_surface(&runner, &MemoryStore::new());
    surface.refresh_devices().await.unwrap();
    let settings = crate::settings::RelaySettings {
        server_port: 8100,
        device_id: Some("ABC123".to_string()),
        video_bit_rate: 4_000_000,
    };

    surface.update_settings(settings.clone()).await.unwrap();

    assert_eq!(surface.settings().await.unwrap(), settings);
    assert_eq!(surface.device_options().selected.as_deref(), Some("ABC123"));
}

#[tokio::test]
async fn test_update_settings_with_blank_device_selects_auto_detect() {
    let runner = MockCommandRunner::new();
    runner.respond(DEVICES, 0, &listing(&["ABC123"]));
    let surface = create_test_surface(&runner, &MemoryStore::new());
    surface.refresh_devices().await.unwrap();
    surface.select_device(Some("ABC123")).await.unwrap();

    let saved = surface
        .update_settings(crate::settings::RelaySettings {
            device_id: Some(String::new()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(saved.device_id, None);
    assert_eq!(surface.settings().await.unwrap().device_id, None);
    assert_eq!(surface.device_options().selected, None);
}

#[tokio::test]
async fn test_update_settings_with_unlisted_device_shows_auto_detect() {
    let runner = MockCommandRunner::new();
    runner.respond(DEVICES, 0, &listing(&["ABC123"]));
    let surface = create_test_surface(&runner, &MemoryStore::new());
    surface.refresh_devices().await.unwrap();

    surface
        .update_settings(crate::settings::RelaySettings {
            device_id: Some("XYZ789".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(
        surface.settings().await.unwrap().device_id.as_deref(),
        Some("XYZ789")
    );
    let options = surface.device_options();
    assert_eq!(options.selected, None);
    assert!(options
        .selected
        .as_deref()
        .map_or(true, |id| options.contains(id)));
}

#[tokio::test]
async fn test_failed_device_save_keeps_previous_selection() {
    let runner = MockCommandRunner::new();
    runner.respond(DEVICES, 0, &listing(&["ABC123"]));
    let shared: Arc<MockCommandRunner> = Arc::new(runner.clone());
    let surface = ControlSurface::builder()
        .enumerator(DeviceEnumerator::new(shared.clone(), "adb"))
        .controller(ServiceController::new(shared.clone(), "/etc/init.d/relay"))
        .store(Arc::new(UciStore::new(shared, "uci")))
        .location(SettingsLocation::new("relay", "config"))
        .build()
        .unwrap();
    surface.refresh_devices().await.unwrap();

    let result = surface.select_device(Some("ABC123")).await;

    assert!(matches!(
        result,
        Err(MirrorError::Config(ConfigError::Store { .. }))
    ));
    assert_eq!(surface.device_options().selected, None);
    assert_eq!(runner.call_count("uci commit relay"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_probes_last_completion_wins() {
    let runner = MockCommandRunner::new();
    runner
        .respond_after(STATUS, 0, "", Duration::from_millis(200))
        .respond_after(STATUS, 3, "", Duration::from_millis(50));
    let surface = create_test_surface(&runner, &MemoryStore::new());
    let mut receiver = surface.subscribe();

    let (slow, fast) = tokio::join!(surface.refresh_status(), surface.refresh_status());

    assert_eq!(slow.state, ServiceState::Running);
    assert_eq!(fast.state, ServiceState::Stopped);
    assert_eq!(surface.current_status(), slow);
    assert!(receiver.has_changed().unwrap());
    assert_eq!(*receiver.borrow_and_update(), slow);

    runner.reset(STATUS);
    runner
        .respond_after(STATUS, 3, "", Duration::from_millis(200))
        .respond_after(STATUS, 0, "", Duration::from_millis(50));

    let (slow, fast) = tokio::join!(surface.refresh_status(), surface.refresh_status());

    assert_eq!(slow.state, ServiceState::Stopped);
    assert_eq!(fast.state, ServiceState::Running);
    assert_eq!(surface.current_status().state, ServiceState::Stopped);
    assert_eq!(receiver.borrow_and_update().state, ServiceState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_poller_refreshes_periodically_without_duplicates() {
    let runner = MockCommandRunner::new();
    runner
        .respond(STATUS, 0, "")
        .respond(START, 0, "")
        .respond(ENABLE, 0, "");
    let surface = create_test_surface(&runner, &MemoryStore::new());
    let poller = StatusPoller::new(surface.clone(), Duration::from_secs(5));

    assert!(poller.mount());
    assert!(!poller.mount());
    assert!(poller.is_mounted());

    // Ticks at 0s, 5s and 10s
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    assert_eq!(runner.call_count(STATUS), 3);

    // Actions do not disturb polling; the resync adds one probe
    surface.perform_action(ServiceAction::Start).await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(runner.call_count(STATUS), 5);

    poller.unmount().await;
    assert!(!poller.is_mounted());
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(runner.call_count(STATUS), 5);

    assert!(poller.mount());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(runner.call_count(STATUS), 6);
    poller.unmount().await;
}

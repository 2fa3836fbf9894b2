use langcon_client::mock::RecordingNotifier;
use langcon_client::{Catalog, ClientConfig, Collaborators, NotifyLevel, Session, VersionPhase};
use langcon_host::{ConfigStore, HostState, LocalBackend, StaticProcesses, StaticReleaseFeed};
use langcon_protocol::{ImeStatus, Language, ProcessInfo, StatusMessage};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    _dir: tempfile::TempDir,
    store: ConfigStore,
    backend: Arc<LocalBackend>,
    notifier: Arc<RecordingNotifier>,
    session: Session,
}

fn notepad() -> ProcessInfo {
    ProcessInfo {
        pid: 311,
        name: "notepad.exe".to_string(),
        title: "memo.txt".to_string(),
    }
}

async fn start(
    config: ClientConfig,
    configure: impl FnOnce(LocalBackend) -> LocalBackend,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::open(dir.path()).unwrap();
    let state = HostState::load(store.clone()).unwrap();
    let processes = Arc::new(StaticProcesses::new(vec![notepad()]));
    let backend = Arc::new(configure(LocalBackend::new(state).with_process_source(processes)));
    let notifier = Arc::new(RecordingNotifier::default());
    let collaborators = Collaborators::new(notifier.clone(), Arc::new(Catalog::builtin()));
    let session = Session::start(config, backend.clone(), backend.as_ref(), collaborators)
        .await
        .unwrap();
    Harness {
        _dir: dir,
        store,
        backend,
        notifier,
        session,
    }
}

fn no_update_check() -> ClientConfig {
    ClientConfig {
        check_for_updates: false,
        ..ClientConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn autosave_writes_config_file_once_settled() {
    let h = start(no_update_check(), |b| b).await;
    assert_eq!(h.session.available_processes(), vec![notepad()]);

    h.session.add_selected_process("notepad.exe").await.unwrap();
    h.session.set_language(Language::Ja).await.unwrap();
    assert!(h.session.has_unsaved_changes());
    assert!(!h.store.path().exists());

    tokio::time::sleep(Duration::from_millis(150)).await;

    let on_disk = h.store.load().unwrap();
    assert_eq!(on_disk.selected_processes, vec!["notepad.exe"]);
    assert_eq!(on_disk.language, Language::Ja);
    assert!(!h.session.has_unsaved_changes());
    assert_eq!(h.session.active_language(), Language::Ja);
    h.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn add_then_remove_never_touches_disk() {
    let h = start(no_update_check(), |b| b).await;

    h.session.add_selected_process("notepad.exe").await.unwrap();
    h.session.remove_selected_process("notepad.exe").await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(!h.store.path().exists());
    assert!(h.session.saved().selected_processes.is_empty());
    assert!(h.backend.inspect(|s| !s.has_unsaved_changes()));
    h.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn backend_pushes_reach_the_session() {
    let h = start(no_update_check(), |b| b).await;

    h.backend.report_focus(Some(notepad()), ImeStatus::Korean);
    let status = StatusMessage::with_values("toast.status.autoSwitch", [("name", "notepad.exe")]);
    h.backend.publish_status(status.clone());
    h.backend.publish_status(status);
    tokio::time::sleep(Duration::from_millis(1)).await;

    let focus = h.session.focus().unwrap();
    assert_eq!(focus.snapshot.process, Some(notepad()));
    assert_eq!(focus.last_updated.len(), 8);
    assert_eq!(h.notifier.count(NotifyLevel::Info), 1);

    h.backend.report_focus(None, ImeStatus::Unknown);
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(h.session.focus().is_none());
    h.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn discard_reverts_draft_and_cancels_autosave() {
    let h = start(no_update_check(), |b| b).await;

    h.session.set_use_auto_to_en(false).await.unwrap();
    h.session.set_detect_interval(5.0).await.unwrap();
    assert_eq!(h.session.draft().detect_interval_secs, 2.0);
    h.session.discard_changes().await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(h.session.draft(), h.session.saved());
    assert!(h.session.draft().use_auto_to_en);
    assert!(!h.store.path().exists());
    h.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn release_feed_drives_the_update_badge() {
    let h = start(ClientConfig::default(), |b| {
        b.with_app_version("0.9.0")
            .with_release_feed(Arc::new(StaticReleaseFeed::new("1.0.0")))
    })
    .await;

    let state = h.session.version_settled().await;
    assert_eq!(state.phase(), VersionPhase::Succeeded);
    assert_eq!(state.current_version, "0.9.0");
    assert!(state.outdated);
    assert_eq!(h.notifier.count(NotifyLevel::Info), 1);
    h.session.shutdown().await;

    assert_eq!(h.backend.hub().subscriber_count(langcon_protocol::PushChannel::FocusChanged), 0);
}

use langcon_protocol::{clamp_detect_interval, FocusSnapshot, ImeStatus, ProcessInfo, StatusMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::backend::LocalBackend;
use crate::platform::{CursorTracker, ForegroundWindow, ImeControl};
use crate::state::HostError;

pub const AUTO_SWITCH_KEY: &str = "toast.status.autoSwitch";
pub const MOUSE_MOVE_KEY: &str = "toast.status.mouseMove";

pub struct Monitor {
    backend: Arc<LocalBackend>,
    window: Arc<dyn ForegroundWindow>,
    ime: Arc<dyn ImeControl>,
    cursor: Arc<dyn CursorTracker>,
    last_cursor: Option<(i32, i32)>,
}

impl Monitor {
    pub fn new(
        backend: Arc<LocalBackend>,
        window: Arc<dyn ForegroundWindow>,
        ime: Arc<dyn ImeControl>,
        cursor: Arc<dyn CursorTracker>,
    ) -> Self {
        Self {
            backend,
            window,
            ime,
            cursor,
            last_cursor: None,
        }
    }

    pub fn tick(&mut self) {
        let (config, refresh_requested) = self
            .backend
            .update(|state| (state.saved().clone(), state.take_process_refresh_request()));

        if refresh_requested {
            if let Err(err) = self.backend.refresh_processes() {
                tracing::warn!(%err, "process refresh failed");
            }
        }

        let active = match self.window.active() {
            Ok(Some(process)) => process,
            Ok(None) => {
                self.backend.report_focus(None, ImeStatus::Unknown);
                return;
            }
            Err(err) => {
                tracing::debug!(%err, "foreground window unavailable");
                return;
            }
        };

        let ime = self.ime.status(&active).unwrap_or(ImeStatus::Unknown);
        let (previous, mut manual_change) = self
            .backend
            .inspect(|state| (state.focus(), state.manual_override_for(&active.name)));
        let selected = config.is_selected(&active.name);
        let mut should_switch = false;
        let mut status = None;

        if selected {
            if switched_away_from_english(previous.as_ref(), &active, ime) {
                manual_change = true;
            }
            if manual_change && ime == ImeStatus::English {
                manual_change = false;
            }
            if config.use_auto_to_en && ime != ImeStatus::English && !manual_change {
                should_switch = true;
            }
        }

        if selected && config.use_mouse_move_event {
            if let Some(position) = self.cursor.position() {
                if let Some(last) = self.last_cursor {
                    if distance(last, position) >= f64::from(config.mouse_sensitivity) {
                        manual_change = false;
                        if ime != ImeStatus::English {
                            should_switch = true;
                            status = Some(named(MOUSE_MOVE_KEY, &active.name));
                        }
                    }
                }
                self.last_cursor = Some(position);
            }
        }

        if should_switch {
            match self.ime.ensure_english(&active) {
                Ok(true) => status = Some(named(AUTO_SWITCH_KEY, &active.name)),
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(process = %active.name, %err, "switch to English failed")
                }
            }
        }

        self.backend.update(|state| state.set_manual_override(&active.name, manual_change));
        self.backend.publish_focus(active, ime, manual_change);
        if let Some(message) = status {
            self.backend.publish_status(message);
        }
    }

    pub async fn run(mut self, scope: CancellationToken) {
        tracing::debug!("monitor started");
        loop {
            self.tick();
            let interval = self
                .backend
                .inspect(|state| clamp_detect_interval(state.saved().detect_interval_secs));
            tokio::select! {
                biased;
                _ = scope.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs_f32(interval)) => {}
            }
        }
        tracing::debug!("monitor stopped");
    }

    /// The resulting focus is published without a manual override.
    pub fn toggle_ime(&self) -> Result<FocusSnapshot, HostError> {
        let active = self
            .window
            .active()
            .map_err(HostError::Ime)?
            .ok_or(HostError::NoActiveWindow)?;
        self.ime.toggle(&active).map_err(HostError::Ime)?;
        let ime = self.ime.status(&active).unwrap_or(ImeStatus::Unknown);
        Ok(self.backend.publish_focus(active, ime, false))
    }
}

fn switched_away_from_english(
    previous: Option<&FocusSnapshot>,
    active: &ProcessInfo,
    ime: ImeStatus,
) -> bool {
    let Some(previous) = previous else {
        return false;
    };
    previous.process.as_ref().is_some_and(|p| p.name == active.name)
        && previous.ime_status == ImeStatus::English
        && ime == ImeStatus::Korean
}

fn distance(a: (i32, i32), b: (i32, i32)) -> f64 {
    let dx = f64::from(b.0) - f64::from(a.0);
    let dy = f64::from(b.1) - f64::from(a.1);
    dx.hypot(dy)
}

fn named(key: &str, process: &str) -> StatusMessage {
    StatusMessage::with_values(key, [("name", process)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::HostState;
    use crate::store::ConfigStore;
    use langcon_client::gateway::PushSource;
    use langcon_protocol::{AppConfig, PushChannel, PushEvent};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeWindow {
        active: Mutex<Option<ProcessInfo>>,
        polls: AtomicUsize,
    }

    impl FakeWindow {
        fn focus(&self, process: Option<ProcessInfo>) {
            *self.active.lock().unwrap() = process;
        }
    }

    impl ForegroundWindow for FakeWindow {
        fn active(&self) -> Result<Option<ProcessInfo>, String> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(self.active.lock().unwrap().clone())
        }
    }

    struct FakeIme {
        status: Mutex<ImeStatus>,
        stuck: bool,
        broken: bool,
        switches: AtomicUsize,
    }

    impl FakeIme {
        fn new(status: ImeStatus) -> Self {
            Self {
                status: Mutex::new(status),
                stuck: false,
                broken: false,
                switches: AtomicUsize::new(0),
            }
        }

        fn set(&self, status: ImeStatus) {
            *self.status.lock().unwrap() = status;
        }

        fn current(&self) -> ImeStatus {
            *self.status.lock().unwrap()
        }
    }

    impl ImeControl for FakeIme {
        fn status(&self, _process: &ProcessInfo) -> Result<ImeStatus, String> {
            Ok(self.current())
        }

        fn ensure_english(&self, _process: &ProcessInfo) -> Result<bool, String> {
            if self.broken {
                return Err("ImmGetContext failed".to_string());
            }
            if self.current() == ImeStatus::English {
                return Ok(false);
            }
            self.switches.fetch_add(1, Ordering::SeqCst);
            if !self.stuck {
                self.set(ImeStatus::English);
            }
            Ok(true)
        }

        fn toggle(&self, _process: &ProcessInfo) -> Result<(), String> {
            let next = match self.current() {
                ImeStatus::English => ImeStatus::Korean,
                _ => ImeStatus::English,
            };
            self.set(next);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeCursor(Mutex<Option<(i32, i32)>>);

    impl FakeCursor {
        fn move_to(&self, x: i32, y: i32) {
            *self.0.lock().unwrap() = Some((x, y));
        }
    }

    impl CursorTracker for FakeCursor {
        fn position(&self) -> Option<(i32, i32)> {
            *self.0.lock().unwrap()
        }
    }

    struct Rig {
        _dir: tempfile::TempDir,
        backend: Arc<LocalBackend>,
        window: Arc<FakeWindow>,
        ime: Arc<FakeIme>,
        cursor: Arc<FakeCursor>,
        monitor: Monitor,
    }

    fn hwp() -> ProcessInfo {
        ProcessInfo {
            pid: 42,
            name: "hwp.exe".to_string(),
            title: "report.hwp".to_string(),
        }
    }

    fn rig(ime: FakeIme, configure: impl FnOnce(&mut AppConfig)) -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.select("hwp.exe");
        configure(&mut config);
        let state = HostState::new(ConfigStore::open(dir.path()).unwrap(), config);
        let backend = Arc::new(LocalBackend::new(state));
        backend.update(|state| state.take_process_refresh_request());

        let window = Arc::new(FakeWindow::default());
        window.focus(Some(hwp()));
        let ime = Arc::new(ime);
        let cursor = Arc::new(FakeCursor::default());
        let monitor = Monitor::new(backend.clone(), window.clone(), ime.clone(), cursor.clone());
        Rig {
            _dir: dir,
            backend,
            window,
            ime,
            cursor,
            monitor,
        }
    }

    fn statuses(sub: &mut langcon_client::Subscription) -> Vec<StatusMessage> {
        let mut out = Vec::new();
        while let Some(event) = sub.try_recv() {
            if let PushEvent::StatusMessage(message) = event {
                out.push(message);
            }
        }
        out
    }

    #[test]
    fn korean_in_selected_window_is_switched_to_english() {
        let mut r = rig(FakeIme::new(ImeStatus::Korean), |_| {});
        let mut status = r.backend.subscribe(PushChannel::StatusMessage).unwrap();
        let mut focus = r.backend.subscribe(PushChannel::FocusChanged).unwrap();

        r.monitor.tick();

        assert_eq!(r.ime.current(), ImeStatus::English);
        assert_eq!(statuses(&mut status), vec![named(AUTO_SWITCH_KEY, "hwp.exe")]);
        match focus.try_recv() {
            Some(PushEvent::FocusChanged(Some(snapshot))) => {
                assert_eq!(snapshot.process, Some(hwp()));
                assert_eq!(snapshot.ime_status, ImeStatus::Korean);
                assert!(!snapshot.manual_override);
            }
            other => panic!("unexpected focus event: {other:?}"),
        }
    }

    #[test]
    fn unselected_or_disabled_windows_are_left_alone() {
        let mut r = rig(FakeIme::new(ImeStatus::Korean), |c| c.use_auto_to_en = false);
        r.monitor.tick();
        assert_eq!(r.ime.current(), ImeStatus::Korean);

        let mut r = rig(FakeIme::new(ImeStatus::Korean), |_| {});
        r.window.focus(Some(ProcessInfo {
            pid: 7,
            name: "game.exe".to_string(),
            title: "game".to_string(),
        }));
        r.monitor.tick();
        assert_eq!(r.ime.current(), ImeStatus::Korean);
        let focus = r.backend.inspect(|s| s.focus()).unwrap();
        assert_eq!(focus.process.map(|p| p.name).as_deref(), Some("game.exe"));
    }

    #[test]
    fn user_switching_back_to_korean_is_respected() {
        let mut r = rig(FakeIme::new(ImeStatus::English), |_| {});
        r.monitor.tick();
        assert_eq!(r.ime.switches.load(Ordering::SeqCst), 0);

        r.ime.set(ImeStatus::Korean);
        r.monitor.tick();
        assert_eq!(r.ime.current(), ImeStatus::Korean);
        assert!(r.backend.inspect(|s| s.manual_override_for("hwp.exe")));
        assert_eq!(r.backend.inspect(|s| s.focus()).map(|f| f.manual_override), Some(true));

        r.monitor.tick();
        assert_eq!(r.ime.switches.load(Ordering::SeqCst), 0);

        r.ime.set(ImeStatus::English);
        r.monitor.tick();
        assert!(!r.backend.inspect(|s| s.manual_override_for("hwp.exe")));
    }

    #[test]
    fn mouse_travel_clears_the_manual_override() {
        let mut r = rig(FakeIme::new(ImeStatus::Korean), |c| c.mouse_sensitivity = 100);
        r.backend.update(|state| state.set_manual_override("hwp.exe", true));
        let mut status = r.backend.subscribe(PushChannel::StatusMessage).unwrap();

        r.cursor.move_to(0, 0);
        r.monitor.tick();
        assert_eq!(r.ime.current(), ImeStatus::Korean);

        r.cursor.move_to(30, 40);
        r.monitor.tick();
        assert_eq!(r.ime.current(), ImeStatus::Korean);
        assert!(statuses(&mut status).is_empty());

        r.cursor.move_to(90, 120);
        r.monitor.tick();
        assert_eq!(r.ime.current(), ImeStatus::English);
        assert!(!r.backend.inspect(|s| s.manual_override_for("hwp.exe")));
        assert_eq!(statuses(&mut status), vec![named(AUTO_SWITCH_KEY, "hwp.exe")]);
    }

    #[test]
    fn mouse_move_status_survives_a_failed_switch() {
        let ime = FakeIme {
            broken: true,
            ..FakeIme::new(ImeStatus::Korean)
        };
        let mut r = rig(ime, |c| c.use_auto_to_en = false);
        let mut status = r.backend.subscribe(PushChannel::StatusMessage).unwrap();

        r.cursor.move_to(0, 0);
        r.monitor.tick();
        r.cursor.move_to(0, 500);
        r.monitor.tick();

        assert_eq!(statuses(&mut status), vec![named(MOUSE_MOVE_KEY, "hwp.exe")]);
    }

    #[test]
    fn repeated_switch_status_is_cooled_down() {
        let ime = FakeIme {
            stuck: true,
            ..FakeIme::new(ImeStatus::Korean)
        };
        let mut r = rig(ime, |_| {});
        let mut status = r.backend.subscribe(PushChannel::StatusMessage).unwrap();

        r.monitor.tick();
        r.monitor.tick();
        r.monitor.tick();

        assert_eq!(r.ime.switches.load(Ordering::SeqCst), 3);
        assert_eq!(statuses(&mut status).len(), 1);
    }

    #[test]
    fn requested_refresh_is_published_once() {
        let mut r = rig(FakeIme::new(ImeStatus::English), |_| {});
        let mut updates = r.backend.subscribe(PushChannel::ProcessesUpdated).unwrap();

        r.monitor.tick();
        assert!(updates.try_recv().is_none());

        r.backend.request_process_refresh();
        r.monitor.tick();
        r.monitor.tick();
        assert_eq!(updates.try_recv(), Some(PushEvent::ProcessesUpdated(Vec::new())));
        assert!(updates.try_recv().is_none());
    }

    #[test]
    fn losing_focus_publishes_none() {
        let mut r = rig(FakeIme::new(ImeStatus::English), |_| {});
        r.monitor.tick();
        let mut focus = r.backend.subscribe(PushChannel::FocusChanged).unwrap();

        r.window.focus(None);
        r.monitor.tick();

        assert_eq!(focus.try_recv(), Some(PushEvent::FocusChanged(None)));
        assert!(r.backend.inspect(|s| s.focus()).is_none());
    }

    #[test]
    fn toggle_flips_and_clears_override_flag() {
        let r = rig(FakeIme::new(ImeStatus::English), |_| {});
        r.backend.update(|state| state.set_manual_override("hwp.exe", true));

        let snapshot = r.monitor.toggle_ime().unwrap();
        assert_eq!(snapshot.ime_status, ImeStatus::Korean);
        assert!(!snapshot.manual_override);

        r.window.focus(None);
        assert!(matches!(r.monitor.toggle_ime(), Err(HostError::NoActiveWindow)));
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_on_the_saved_interval_until_cancelled() {
        let r = rig(FakeIme::new(ImeStatus::English), |c| c.detect_interval_secs = 0.5);
        let window = r.window.clone();
        let scope = CancellationToken::new();
        let task = tokio::spawn(r.monitor.run(scope.clone()));

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(window.polls.load(Ordering::SeqCst), 3);

        scope.cancel();
        task.await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(window.polls.load(Ordering::SeqCst), 3);
    }
}

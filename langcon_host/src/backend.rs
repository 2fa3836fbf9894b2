use async_trait::async_trait;
use langcon_client::gateway::{CommandGateway, PushSource, Subscription};
use langcon_client::{BackendError, PushHub};
use langcon_protocol::{
    Command, FocusSnapshot, ImeStatus, ProcessInfo, PushChannel, PushEvent, StatusMessage,
    ViewModel,
};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::platform::{Autostart, ProcessSource, RecordingAutostart, StaticProcesses};
use crate::release::{ReleaseFeed, StaticReleaseFeed};
use crate::state::{HostError, HostState};

pub const STATUS_COOLDOWN: Duration = Duration::from_millis(1000);

pub struct LocalBackend {
    state: Mutex<HostState>,
    hub: PushHub,
    processes: Arc<dyn ProcessSource>,
    autostart: Arc<dyn Autostart>,
    releases: Arc<dyn ReleaseFeed>,
    app_version: String,
    status_cooldown: Duration,
}

impl LocalBackend {
    pub fn new(state: HostState) -> Self {
        Self {
            state: Mutex::new(state),
            hub: PushHub::new(),
            processes: Arc::new(StaticProcesses::default()),
            autostart: Arc::new(RecordingAutostart::default()),
            releases: Arc::new(StaticReleaseFeed::unreachable()),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            status_cooldown: STATUS_COOLDOWN,
        }
    }

    pub fn with_process_source(mut self, source: Arc<dyn ProcessSource>) -> Self {
        self.processes = source;
        self
    }

    pub fn with_autostart(mut self, autostart: Arc<dyn Autostart>) -> Self {
        self.autostart = autostart;
        self
    }

    pub fn with_release_feed(mut self, feed: Arc<dyn ReleaseFeed>) -> Self {
        self.releases = feed;
        self
    }

    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    pub fn with_status_cooldown(mut self, cooldown: Duration) -> Self {
        self.status_cooldown = cooldown;
        self
    }

    pub fn hub(&self) -> &PushHub {
        &self.hub
    }

    pub fn inspect<R>(&self, f: impl FnOnce(&HostState) -> R) -> R {
        f(&self.lock())
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut HostState) -> R) -> R {
        f(&mut self.lock())
    }

    /// The next monitor tick rescans the process list.
    pub fn request_process_refresh(&self) {
        self.lock().request_process_refresh();
    }

    pub fn report_focus(
        &self,
        process: Option<ProcessInfo>,
        ime_status: ImeStatus,
    ) -> Option<FocusSnapshot> {
        match process {
            Some(process) => {
                let manual_override = self.lock().manual_override_for(&process.name);
                Some(self.publish_focus(process, ime_status, manual_override))
            }
            None => {
                self.lock().clear_focus();
                self.hub.publish(PushEvent::FocusChanged(None));
                None
            }
        }
    }

    pub(crate) fn publish_focus(
        &self,
        process: ProcessInfo,
        ime_status: ImeStatus,
        manual_override: bool,
    ) -> FocusSnapshot {
        let snapshot = self.lock().set_focus(Some(process), ime_status, manual_override);
        self.hub.publish(PushEvent::FocusChanged(Some(snapshot.clone())));
        snapshot
    }

    /// Publishes unless the same message went out within the cooldown.
    pub fn publish_status(&self, message: StatusMessage) -> bool {
        let now = Instant::now();
        {
            let mut state = self.lock();
            if !state.should_emit_status(&message, now, self.status_cooldown) {
                tracing::trace!(key = %message.key, "status suppressed by cooldown");
                return false;
            }
            state.record_status(message.clone(), now);
        }
        self.hub.publish(PushEvent::StatusMessage(message));
        true
    }

    fn scan_processes(&self) -> Result<Vec<ProcessInfo>, HostError> {
        let list = self.processes.enumerate().map_err(HostError::ProcessScan)?;
        self.lock().set_available_processes(list.clone());
        tracing::debug!(count = list.len(), "process list refreshed");
        Ok(list)
    }

    pub(crate) fn refresh_processes(&self) -> Result<Vec<ProcessInfo>, HostError> {
        let list = self.scan_processes()?;
        self.hub.publish(PushEvent::ProcessesUpdated(list.clone()));
        Ok(list)
    }

    fn handle(&self, command: &Command) -> Result<ViewModel, HostError> {
        match command {
            Command::LoadState => {
                let pending = self.lock().take_process_refresh_request();
                if pending {
                    self.scan_processes()?;
                }
            }
            Command::RefreshProcesses => {
                self.refresh_processes()?;
            }
            Command::SaveChanges => {
                self.lock().save_changes()?;
            }
            Command::DiscardChanges => {
                self.lock().discard_changes();
            }
            Command::AddSelectedProcess { name } => {
                self.lock().add_selected_process(name);
            }
            Command::RemoveSelectedProcess { name } => {
                self.lock().remove_selected_process(name);
            }
            Command::SetLanguage { language } => {
                self.lock().set_language(*language);
            }
            Command::SetStartWithWindows { enabled } => {
                self.lock().set_start_with_windows(*enabled, self.autostart.as_ref())?;
            }
            Command::SetUseAutoToEn { enabled } => {
                self.lock().set_use_auto_to_en(*enabled);
            }
            Command::SetUseMouseMoveEvent { enabled } => {
                self.lock().set_use_mouse_move_event(*enabled);
            }
            Command::SetDetectInterval { seconds } => {
                self.lock().set_detect_interval(*seconds);
            }
            Command::SetMouseSensitivity { distance } => {
                self.lock().set_mouse_sensitivity(*distance);
            }
            Command::SetManualOverride { process_name, enabled } => {
                self.lock().set_manual_override(process_name, *enabled);
            }
        }
        Ok(self.lock().to_view_model())
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl CommandGateway for LocalBackend {
    async fn invoke(&self, command: Command) -> Result<ViewModel, BackendError> {
        self.handle(&command).map_err(|err| {
            tracing::warn!(command = command.name(), %err, "command failed");
            BackendError::rejected(command.name(), err.to_string())
        })
    }

    async fn app_version(&self) -> Result<String, BackendError> {
        Ok(self.app_version.clone())
    }

    async fn latest_version(&self) -> Result<String, BackendError> {
        self.releases.latest_version().await
    }
}

impl PushSource for LocalBackend {
    fn subscribe(&self, channel: PushChannel) -> Result<Subscription, BackendError> {
        self.hub.subscribe(channel)
    }
}

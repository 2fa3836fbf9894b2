use async_trait::async_trait;
use langcon_protocol::{AppConfig, Command, FocusSnapshot, ProcessInfo, StatusMessage, ViewModel};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use crate::error::BackendError;
use crate::gateway::CommandGateway;
use crate::notify::{Notifier, NotifyLevel};

#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Invoke(Command),
    AppVersion,
    LatestVersion,
}

#[derive(Default)]
struct MockState {
    saved: AppConfig,
    draft: AppConfig,
    processes: Vec<ProcessInfo>,
    focus: Option<FocusSnapshot>,
    pending_status: Option<StatusMessage>,
    calls: Vec<MockCall>,
    failures: HashMap<&'static str, VecDeque<BackendError>>,
    app_version: Option<Result<String, BackendError>>,
    latest_versions: VecDeque<Result<String, BackendError>>,
    latest_calls: Vec<Instant>,
    persisted: Vec<AppConfig>,
}

pub struct MockGateway {
    state: Mutex<MockState>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_saved(self, config: AppConfig) -> Self {
        {
            let mut state = self.lock();
            state.draft = config.clone();
            state.saved = config;
        }
        self
    }

    pub fn with_processes(self, processes: Vec<ProcessInfo>) -> Self {
        self.lock().processes = processes;
        self
    }

    pub fn with_focus(self, focus: FocusSnapshot) -> Self {
        self.lock().focus = Some(focus);
        self
    }

    pub fn with_app_version(self, version: impl Into<String>) -> Self {
        self.lock().app_version = Some(Ok(version.into()));
        self
    }

    pub fn with_app_version_error(self, err: BackendError) -> Self {
        self.lock().app_version = Some(Err(err));
        self
    }

    /// Answers for successive `latest_version` calls. Once drained every call fails.
    pub fn with_latest_versions(
        self,
        answers: impl IntoIterator<Item = Result<String, BackendError>>,
    ) -> Self {
        self.lock().latest_versions.extend(answers);
        self
    }

    pub fn fail_next(&self, command: &'static str, message: impl Into<String>) {
        self.lock()
            .failures
            .entry(command)
            .or_default()
            .push_back(BackendError::rejected(command, message));
    }

    /// Attached to the next successful response only.
    pub fn queue_status(&self, message: StatusMessage) {
        self.lock().pending_status = Some(message);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn invoke_count(&self, command: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, MockCall::Invoke(c) if c.name() == command))
            .count()
    }

    pub fn persisted(&self) -> Vec<AppConfig> {
        self.lock().persisted.clone()
    }

    pub fn latest_call_times(&self) -> Vec<Instant> {
        self.lock().latest_calls.clone()
    }

    pub fn draft(&self) -> AppConfig {
        self.lock().draft.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl MockState {
    fn view_model(&mut self) -> ViewModel {
        ViewModel {
            saved_config: self.saved.clone(),
            draft_config: self.draft.clone(),
            available_processes: self.processes.clone(),
            focus: self.focus.clone(),
            status_message: self.pending_status.take(),
        }
    }
}

#[async_trait]
impl CommandGateway for MockGateway {
    async fn invoke(&self, command: Command) -> Result<ViewModel, BackendError> {
        let mut state = self.lock();
        state.calls.push(MockCall::Invoke(command.clone()));

        if let Some(err) = state
            .failures
            .get_mut(command.name())
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }

        match &command {
            Command::SaveChanges => {
                if state.draft != state.saved {
                    let mut next = state.draft.clone();
                    next.normalize();
                    state.persisted.push(next.clone());
                    state.draft = next.clone();
                    state.saved = next;
                }
            }
            Command::DiscardChanges => state.draft = state.saved.clone(),
            Command::SetManualOverride { process_name, enabled } => {
                if let Some(focus) = state.focus.as_mut() {
                    let focused = focus
                        .process
                        .as_ref()
                        .is_some_and(|p| &p.name == process_name);
                    if focused {
                        focus.manual_override = *enabled;
                    }
                }
            }
            other => {
                other.stage(&mut state.draft);
            }
        }
        Ok(state.view_model())
    }

    async fn app_version(&self) -> Result<String, BackendError> {
        let mut state = self.lock();
        state.calls.push(MockCall::AppVersion);
        state
            .app_version
            .clone()
            .unwrap_or_else(|| Ok(env!("CARGO_PKG_VERSION").to_string()))
    }

    async fn latest_version(&self) -> Result<String, BackendError> {
        let mut state = self.lock();
        state.calls.push(MockCall::LatestVersion);
        state.latest_calls.push(Instant::now());
        state
            .latest_versions
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::unavailable("no release feed")))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    entries: Mutex<Vec<(NotifyLevel, String)>>,
}

impl RecordingNotifier {
    pub fn entries(&self) -> Vec<(NotifyLevel, String)> {
        self.lock().clone()
    }

    pub fn count(&self, level: NotifyLevel) -> usize {
        self.lock().iter().filter(|(l, _)| *l == level).count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(NotifyLevel, String)>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NotifyLevel, text: &str) {
        self.lock().push((level, text.to_string()));
    }
}

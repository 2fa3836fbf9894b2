use langcon_protocol::{AppConfig, Command, Language, ProcessInfo, StatusMessage};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::autosave::AutosaveScheduler;
use crate::config::ClientConfig;
use crate::dispatch::Dispatcher;
use crate::engine::{Collaborators, FocusState, ProcessRow, ReconciliationEngine};
use crate::error::{SessionError, VersionCheckError};
use crate::events::EventBridge;
use crate::gateway::{CommandGateway, PushSource};
use crate::notify::NotifyLevel;
use crate::version::{Announcer, VersionChecker, VersionPhase, VersionState};

pub struct Session {
    dispatcher: Arc<Dispatcher>,
    autosave: AutosaveScheduler,
    bridge: Option<EventBridge>,
    version: watch::Receiver<VersionState>,
    version_task: Option<JoinHandle<()>>,
}

impl Session {
    /// Only a failed subscription is fatal. A failed initial load is reported
    /// and the session keeps its defaults.
    pub async fn start(
        config: ClientConfig,
        gateway: Arc<dyn CommandGateway>,
        pushes: &dyn PushSource,
        collaborators: Collaborators,
    ) -> Result<Self, SessionError> {
        let scope = CancellationToken::new();
        let engine = ReconciliationEngine::new(config.initial_language, collaborators);
        let dispatcher = Arc::new(Dispatcher::new(engine, Arc::clone(&gateway), scope.clone()));

        let bridge = EventBridge::attach(pushes, Arc::clone(&dispatcher))?;
        let autosave = AutosaveScheduler::new(config.autosave_delay, Arc::clone(&dispatcher));

        let announce: Announcer = {
            let dispatcher = Arc::clone(&dispatcher);
            Arc::new(move |message: StatusMessage| {
                dispatcher.engine().announce(NotifyLevel::Info, &message)
            })
        };
        let checker = VersionChecker::new(gateway, config.retry, announce, scope.child_token());
        let version = checker.subscribe();

        let mut session = Self {
            dispatcher,
            autosave,
            bridge: Some(bridge),
            version,
            version_task: None,
        };

        if let Err(err) = session.load_state().await {
            tracing::warn!(%err, "initial load failed; continuing with defaults");
        }

        if config.check_for_updates {
            session.version_task = Some(tokio::spawn(async move {
                match checker.run().await {
                    Ok(_) | Err(VersionCheckError::Cancelled) => {}
                    Err(err) => tracing::info!(%err, "update check did not complete"),
                }
            }));
        } else {
            tracing::debug!("update check disabled");
        }

        Ok(session)
    }

    pub async fn load_state(&self) -> Result<(), SessionError> {
        self.run(Command::LoadState).await
    }

    pub async fn save_changes(&self) -> Result<(), SessionError> {
        if self.autosave.cancel() {
            tracing::debug!("explicit save superseded pending autosave");
        }
        self.run(Command::SaveChanges).await
    }

    pub async fn discard_changes(&self) -> Result<(), SessionError> {
        self.autosave.cancel();
        self.run(Command::DiscardChanges).await
    }

    pub async fn add_selected_process(&self, name: impl Into<String>) -> Result<(), SessionError> {
        self.run(Command::AddSelectedProcess { name: name.into() }).await
    }

    pub async fn remove_selected_process(
        &self,
        name: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.run(Command::RemoveSelectedProcess { name: name.into() }).await
    }

    pub async fn refresh_processes(&self) -> Result<(), SessionError> {
        self.run(Command::RefreshProcesses).await
    }

    pub async fn set_language(&self, language: Language) -> Result<(), SessionError> {
        self.run(Command::SetLanguage { language }).await
    }

    pub async fn set_start_with_windows(&self, enabled: bool) -> Result<(), SessionError> {
        self.run(Command::SetStartWithWindows { enabled }).await
    }

    pub async fn set_use_auto_to_en(&self, enabled: bool) -> Result<(), SessionError> {
        self.run(Command::SetUseAutoToEn { enabled }).await
    }

    pub async fn set_use_mouse_move_event(&self, enabled: bool) -> Result<(), SessionError> {
        self.run(Command::SetUseMouseMoveEvent { enabled }).await
    }

    pub async fn set_detect_interval(&self, seconds: f32) -> Result<(), SessionError> {
        self.run(Command::SetDetectInterval { seconds }).await
    }

    pub async fn set_mouse_sensitivity(&self, distance: u32) -> Result<(), SessionError> {
        self.run(Command::SetMouseSensitivity { distance }).await
    }

    pub async fn set_manual_override(
        &self,
        process_name: impl Into<String>,
        enabled: bool,
    ) -> Result<(), SessionError> {
        self.run(Command::SetManualOverride {
            process_name: process_name.into(),
            enabled,
        })
        .await
    }

    async fn run(&self, command: Command) -> Result<(), SessionError> {
        let mutates_draft = command.mutates_draft();
        self.dispatcher.dispatch(command).await?;
        if mutates_draft {
            self.autosave.schedule();
        }
        Ok(())
    }

    pub fn draft(&self) -> AppConfig {
        self.dispatcher.engine().draft().clone()
    }

    pub fn saved(&self) -> AppConfig {
        self.dispatcher.engine().saved().clone()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.dispatcher.engine().has_unsaved_changes()
    }

    pub fn focus(&self) -> Option<FocusState> {
        self.dispatcher.engine().focus().cloned()
    }

    pub fn available_processes(&self) -> Vec<ProcessInfo> {
        self.dispatcher.engine().available_processes().to_vec()
    }

    pub fn process_rows(&self) -> Vec<ProcessRow> {
        self.dispatcher.engine().process_rows()
    }

    pub fn active_language(&self) -> Language {
        self.dispatcher.engine().active_language()
    }

    pub fn version_state(&self) -> VersionState {
        self.version.borrow().clone()
    }

    pub fn version_updates(&self) -> watch::Receiver<VersionState> {
        self.version.clone()
    }

    /// Also resolves if the check stopped without settling.
    pub async fn version_settled(&self) -> VersionState {
        let mut rx = self.version.clone();
        let settled = rx
            .wait_for(|s| matches!(s.phase(), VersionPhase::Succeeded | VersionPhase::Failed))
            .await
            .map(|state| state.clone());
        match settled {
            Ok(state) => state,
            // The checker dropped its sender without settling.
            Err(_) => self.version_state(),
        }
    }

    pub fn autosave_pending(&self) -> bool {
        self.autosave.is_pending()
    }

    pub async fn shutdown(mut self) {
        self.dispatcher.scope().cancel();
        self.autosave.cancel();

        if let Some(task) = self.version_task.take() {
            if let Err(err) = task.await {
                tracing::warn!(%err, "version check task ended abnormally");
            }
        }
        if let Some(bridge) = self.bridge.take() {
            bridge.detach().await;
        }
        tracing::info!("session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispatcher.scope().cancel();
    }
}


use langcon_protocol::{
    AppConfig, Command, FocusSnapshot, Language, ProcessInfo, PushEvent, StatusMessage, ViewModel,
};
use std::sync::Arc;

use crate::error::BackendError;
use crate::i18n::{Catalog, Translator, COMMAND_FAILED_KEY};
use crate::notify::{Notifier, NotifyLevel, TracingNotifier};

pub type LanguageListener = Box<dyn Fn(Language) + Send + Sync>;

pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    pub translator: Arc<dyn Translator>,
    pub on_language_changed: LanguageListener,
}

impl Collaborators {
    pub fn new(notifier: Arc<dyn Notifier>, translator: Arc<dyn Translator>) -> Self {
        Self {
            notifier,
            translator,
            on_language_changed: Box::new(|_| {}),
        }
    }

    pub fn on_language_changed(
        mut self,
        listener: impl Fn(Language) + Send + Sync + 'static,
    ) -> Self {
        self.on_language_changed = Box::new(listener);
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new(Arc::new(TracingNotifier), Arc::new(Catalog::builtin()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FocusState {
    pub snapshot: FocusSnapshot,
    /// Backend `updatedAt` when present, otherwise local time at acceptance.
    pub last_updated: String,
}

/// Selection is keyed on the process name, so every process sharing a name
/// shows the same `selected` flag.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRow {
    pub process: ProcessInfo,
    pub selected: bool,
}

pub struct ReconciliationEngine {
    saved: AppConfig,
    draft: AppConfig,
    available_processes: Vec<ProcessInfo>,
    focus: Option<FocusState>,
    active_language: Language,
    collaborators: Collaborators,
}

impl ReconciliationEngine {
    pub fn new(initial_language: Language, collaborators: Collaborators) -> Self {
        let config = AppConfig {
            language: initial_language,
            ..AppConfig::default()
        };
        Self {
            saved: config.clone(),
            draft: config,
            available_processes: Vec::new(),
            focus: None,
            active_language: initial_language,
            collaborators,
        }
    }

    pub fn apply_view_model(&mut self, vm: ViewModel) {
        let ViewModel {
            saved_config,
            draft_config,
            available_processes,
            focus,
            status_message,
        } = vm;

        let language = saved_config.language;
        self.saved = saved_config;
        self.draft = draft_config;
        self.available_processes = available_processes;
        self.replace_focus(focus);
        self.switch_language(language);

        if let Some(message) = status_message {
            self.forward_status(&message);
        }
    }

    pub fn apply_focus_push(&mut self, snapshot: Option<FocusSnapshot>) {
        self.replace_focus(snapshot);
    }

    pub fn apply_process_list_push(&mut self, list: Vec<ProcessInfo>) {
        self.available_processes = list;
    }

    pub fn apply_status_push(&mut self, message: StatusMessage) {
        self.forward_status(&message);
    }

    pub fn apply_push(&mut self, event: PushEvent) {
        match event {
            PushEvent::FocusChanged(snapshot) => self.apply_focus_push(snapshot),
            PushEvent::StatusMessage(message) => self.apply_status_push(message),
            PushEvent::ProcessesUpdated(list) => self.apply_process_list_push(list),
        }
    }

    pub fn stage_draft(&mut self, command: &Command) -> bool {
        command.stage(&mut self.draft)
    }

    pub fn report_failure(&self, err: &BackendError) {
        let message =
            StatusMessage::with_values(COMMAND_FAILED_KEY, [("message", err.to_string())]);
        self.announce(NotifyLevel::Error, &message);
    }

    pub fn announce(&self, level: NotifyLevel, message: &StatusMessage) {
        let text = self
            .collaborators
            .translator
            .resolve(self.active_language, &message.key, &message.values);
        self.collaborators.notifier.notify(level, &text);
    }

    pub fn saved(&self) -> &AppConfig {
        &self.saved
    }

    pub fn draft(&self) -> &AppConfig {
        &self.draft
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.draft != self.saved
    }

    pub fn available_processes(&self) -> &[ProcessInfo] {
        &self.available_processes
    }

    pub fn process_rows(&self) -> Vec<ProcessRow> {
        self.available_processes
            .iter()
            .map(|process| ProcessRow {
                selected: self.draft.is_selected(&process.name),
                process: process.clone(),
            })
            .collect()
    }

    pub fn focus(&self) -> Option<&FocusState> {
        self.focus.as_ref()
    }

    pub fn active_language(&self) -> Language {
        self.active_language
    }

    fn replace_focus(&mut self, snapshot: Option<FocusSnapshot>) {
        self.focus = snapshot.map(|snapshot| FocusState {
            last_updated: snapshot.updated_at.clone().unwrap_or_else(display_now),
            snapshot,
        });
    }

    fn switch_language(&mut self, language: Language) {
        if language == self.active_language {
            return;
        }
        tracing::info!(
            from = %self.active_language,
            to = %language,
            "active language changed by backend"
        );
        self.active_language = language;
        (self.collaborators.on_language_changed)(language);
    }

    fn forward_status(&self, message: &StatusMessage) {
        tracing::debug!(key = %message.key, "forwarding status message");
        self.announce(NotifyLevel::Info, message);
    }
}

fn display_now() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

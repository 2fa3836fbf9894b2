use chrono::{DateTime, Local};
use langcon_protocol::{
    clamp_detect_interval, clamp_mouse_sensitivity, AppConfig, FocusSnapshot, ImeStatus, Language,
    ProcessInfo, StatusMessage, ViewModel,
};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::platform::Autostart;
use crate::store::{ConfigStore, StoreError};

pub const FOCUS_TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("autostart update failed: {0}")]
    Autostart(String),
    #[error("process enumeration failed: {0}")]
    ProcessScan(String),
    #[error("no active window")]
    NoActiveWindow,
    #[error("ime control failed: {0}")]
    Ime(String),
}

#[derive(Debug, Clone)]
struct FocusRecord {
    process: Option<ProcessInfo>,
    ime_status: ImeStatus,
    manual_override: bool,
    at: DateTime<Local>,
}

impl FocusRecord {
    fn snapshot(&self) -> FocusSnapshot {
        FocusSnapshot {
            process: self.process.clone(),
            ime_status: self.ime_status,
            manual_override: self.manual_override,
            updated_at: Some(self.at.format(FOCUS_TIME_FORMAT).to_string()),
        }
    }
}

#[derive(Debug, Clone)]
struct StatusRecord {
    message: StatusMessage,
    at: Instant,
}

pub struct HostState {
    store: ConfigStore,
    saved: AppConfig,
    draft: AppConfig,
    processes: Vec<ProcessInfo>,
    focus: Option<FocusRecord>,
    manual_overrides: HashSet<String>,
    pending_process_refresh: bool,
    last_status: Option<StatusRecord>,
}

impl HostState {
    pub fn new(store: ConfigStore, config: AppConfig) -> Self {
        Self {
            store,
            saved: config.clone(),
            draft: config,
            processes: Vec::new(),
            focus: None,
            manual_overrides: HashSet::new(),
            pending_process_refresh: true,
            last_status: None,
        }
    }

    pub fn load(store: ConfigStore) -> Result<Self, HostError> {
        let config = store.load()?;
        Ok(Self::new(store, config))
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

    pub fn save_changes(&mut self) -> Result<bool, HostError> {
        if !self.has_unsaved_changes() {
            return Ok(false);
        }
        let mut next = self.draft.clone();
        next.normalize();
        self.store.save(&next)?;
        self.saved = next.clone();
        self.draft = next;

        let saved = &self.saved;
        self.manual_overrides.retain(|name| saved.is_selected(name));
        tracing::info!(processes = self.saved.selected_processes.len(), "settings saved");
        Ok(true)
    }

    pub fn discard_changes(&mut self) -> bool {
        if !self.has_unsaved_changes() {
            return false;
        }
        self.draft = self.saved.clone();
        true
    }

    pub fn set_use_auto_to_en(&mut self, enabled: bool) -> bool {
        replace(&mut self.draft.use_auto_to_en, enabled)
    }

    pub fn set_use_mouse_move_event(&mut self, enabled: bool) -> bool {
        replace(&mut self.draft.use_mouse_move_event, enabled)
    }

    // The draft only follows a successful autostart change.
    pub fn set_start_with_windows(
        &mut self,
        enabled: bool,
        autostart: &dyn Autostart,
    ) -> Result<bool, HostError> {
        if self.draft.start_with_windows == enabled {
            return Ok(false);
        }
        autostart.set_enabled(enabled).map_err(HostError::Autostart)?;
        self.draft.start_with_windows = enabled;
        Ok(true)
    }

    pub fn set_detect_interval(&mut self, seconds: f32) -> bool {
        let next = clamp_detect_interval(seconds);
        if (self.draft.detect_interval_secs - next).abs() > f32::EPSILON {
            self.draft.detect_interval_secs = next;
            true
        } else {
            false
        }
    }

    pub fn set_mouse_sensitivity(&mut self, distance: u32) -> bool {
        replace(&mut self.draft.mouse_sensitivity, clamp_mouse_sensitivity(distance))
    }

    pub fn set_language(&mut self, language: Language) -> bool {
        replace(&mut self.draft.language, language)
    }

    pub fn add_selected_process(&mut self, name: &str) -> bool {
        self.draft.select(name)
    }

    pub fn remove_selected_process(&mut self, name: &str) -> bool {
        self.manual_overrides.remove(name);
        self.draft.deselect(name)
    }

    pub fn set_manual_override(&mut self, process_name: &str, enabled: bool) {
        if enabled {
            self.manual_overrides.insert(process_name.to_string());
        } else {
            self.manual_overrides.remove(process_name);
        }
        if let Some(focus) = self.focus.as_mut() {
            if focus.process.as_ref().is_some_and(|p| p.name == process_name) {
                focus.manual_override = enabled;
            }
        }
    }

    pub fn manual_override_for(&self, process_name: &str) -> bool {
        self.manual_overrides.contains(process_name)
    }

    pub fn processes(&self) -> &[ProcessInfo] {
        &self.processes
    }

    pub fn set_available_processes(&mut self, processes: Vec<ProcessInfo>) {
        self.processes = processes;
    }

    pub fn request_process_refresh(&mut self) {
        self.pending_process_refresh = true;
    }

    pub fn take_process_refresh_request(&mut self) -> bool {
        std::mem::take(&mut self.pending_process_refresh)
    }

    pub fn set_focus(
        &mut self,
        process: Option<ProcessInfo>,
        ime_status: ImeStatus,
        manual_override: bool,
    ) -> FocusSnapshot {
        let record = FocusRecord {
            process,
            ime_status,
            manual_override,
            at: Local::now(),
        };
        let snapshot = record.snapshot();
        self.focus = Some(record);
        snapshot
    }

    pub fn clear_focus(&mut self) {
        self.focus = None;
    }

    pub fn focus(&self) -> Option<FocusSnapshot> {
        self.focus.as_ref().map(FocusRecord::snapshot)
    }

    /// An identical message inside `cooldown` of the last emission is suppressed.
    pub fn should_emit_status(
        &self,
        message: &StatusMessage,
        now: Instant,
        cooldown: Duration,
    ) -> bool {
        match &self.last_status {
            Some(record) if record.message == *message => {
                now.saturating_duration_since(record.at) >= cooldown
            }
            _ => true,
        }
    }

    pub fn record_status(&mut self, message: StatusMessage, now: Instant) {
        self.last_status = Some(StatusRecord { message, at: now });
    }

    pub fn to_view_model(&self) -> ViewModel {
        ViewModel {
            saved_config: self.saved.clone(),
            draft_config: self.draft.clone(),
            available_processes: self.processes.clone(),
            focus: self.focus(),
            status_message: None,
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

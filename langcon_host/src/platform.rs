use langcon_protocol::{ImeStatus, ProcessInfo};
use std::sync::{Mutex, MutexGuard};

pub trait ProcessSource: Send + Sync {
    fn enumerate(&self) -> Result<Vec<ProcessInfo>, String>;
}

pub trait Autostart: Send + Sync {
    fn set_enabled(&self, enabled: bool) -> Result<(), String>;
}

pub trait ForegroundWindow: Send + Sync {
    /// `Ok(None)` when nothing user-facing has focus.
    fn active(&self) -> Result<Option<ProcessInfo>, String>;
}

pub trait ImeControl: Send + Sync {
    fn status(&self, process: &ProcessInfo) -> Result<ImeStatus, String>;

    /// Returns true only if a switch was actually sent.
    fn ensure_english(&self, process: &ProcessInfo) -> Result<bool, String>;

    fn toggle(&self, process: &ProcessInfo) -> Result<(), String>;
}

pub trait CursorTracker: Send + Sync {
    fn position(&self) -> Option<(i32, i32)>;
}

#[derive(Debug, Default)]
pub struct StaticProcesses {
    processes: Mutex<Vec<ProcessInfo>>,
}

impl StaticProcesses {
    pub fn new(processes: Vec<ProcessInfo>) -> Self {
        Self {
            processes: Mutex::new(processes),
        }
    }

    pub fn replace(&self, processes: Vec<ProcessInfo>) {
        *lock(&self.processes) = processes;
    }
}

impl ProcessSource for StaticProcesses {
    fn enumerate(&self) -> Result<Vec<ProcessInfo>, String> {
        Ok(lock(&self.processes).clone())
    }
}

#[derive(Debug, Default)]
pub struct RecordingAutostart {
    calls: Mutex<Vec<bool>>,
    failure: Option<String>,
}

impl RecordingAutostart {
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failure: Some(reason.into()),
        }
    }

    pub fn calls(&self) -> Vec<bool> {
        lock(&self.calls).clone()
    }
}

impl Autostart for RecordingAutostart {
    fn set_enabled(&self, enabled: bool) -> Result<(), String> {
        if let Some(reason) = &self.failure {
            return Err(reason.clone());
        }
        lock(&self.calls).push(enabled);
        tracing::debug!(enabled, "autostart entry updated");
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

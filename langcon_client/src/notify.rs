use serde::Serialize;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    Success,
    Error,
}

/// User-facing toast surface. Called while session state is locked, so
/// implementations must not call back into the session.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotifyLevel, text: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NotifyLevel, text: &str) {
        match level {
            NotifyLevel::Info => tracing::info!(target: "langcon::notify", "{text}"),
            NotifyLevel::Success => {
                tracing::info!(target: "langcon::notify", success = true, "{text}")
            }
            NotifyLevel::Error => tracing::error!(target: "langcon::notify", "{text}"),
        }
    }
}

pub mod autosave;
pub mod config;
mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod gateway;
pub mod hub;
pub mod i18n;
pub mod logging;
pub mod mock;
pub mod notify;
pub mod session;
pub mod timer;
pub mod version;

pub use config::ClientConfig;
pub use engine::{Collaborators, FocusState, ProcessRow, ReconciliationEngine};
pub use error::{BackendError, SessionError, TranslateError, VersionCheckError};
pub use gateway::{CommandGateway, PushSource, Subscription};
pub use hub::PushHub;
pub use i18n::{Catalog, Translator};
pub use notify::{Notifier, NotifyLevel, TracingNotifier};
pub use session::Session;
pub use version::{is_outdated, RetryPolicy, VersionPhase, VersionState};

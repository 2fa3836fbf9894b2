use langcon_protocol::Language;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{command} rejected: {message}")]
    Rejected { command: String, message: String },
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    pub fn rejected(command: &str, message: impl Into<String>) -> Self {
        BackendError::Rejected {
            command: command.to_string(),
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        BackendError::Unavailable(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            BackendError::Rejected { message, .. } => message,
            BackendError::Unavailable(message) => message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("session closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionCheckError {
    #[error("local app version unavailable: {0}")]
    VersionUnavailable(BackendError),
    #[error("latest version lookup failed after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: BackendError },
    #[error("version check cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("no translation for {key:?} in {language} or the fallback language")]
    UnlocalizedKey { language: Language, key: String },
}

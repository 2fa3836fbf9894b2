use langcon_protocol::StatusMessage;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{BackendError, VersionCheckError};
use crate::gateway::CommandGateway;
use crate::i18n::UPDATE_AVAILABLE_KEY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(8000),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    pub fn delays(&self) -> Vec<Duration> {
        (1..=self.max_attempts).map(|a| self.delay_for(a)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionPhase {
    Idle,
    Checking,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionState {
    pub current_version: String,
    pub latest_version: Option<String>,
    pub checking: bool,
    pub failed: bool,
    pub outdated: bool,
    pub notified_once: bool,
}

impl VersionState {
    pub fn phase(&self) -> VersionPhase {
        if self.checking {
            VersionPhase::Checking
        } else if self.failed {
            VersionPhase::Failed
        } else if self.latest_version.is_some() {
            VersionPhase::Succeeded
        } else {
            VersionPhase::Idle
        }
    }
}

/// Dot-separated numeric components. Leading `v` and non-digit suffixes
/// (`1.2.0-beta`) are ignored; an empty or non-numeric component counts as 0.
pub fn parse_version(raw: &str) -> Vec<u64> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
    trimmed
        .split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

/// True only when `latest` is strictly newer. Missing trailing components are 0.
pub fn is_outdated(current: &str, latest: &str) -> bool {
    let current = parse_version(current);
    let latest = parse_version(latest);
    let len = current.len().max(latest.len());
    for i in 0..len {
        let c = current.get(i).copied().unwrap_or(0);
        let l = latest.get(i).copied().unwrap_or(0);
        if c < l {
            return true;
        }
        if c > l {
            return false;
        }
    }
    false
}

pub type Announcer = Arc<dyn Fn(StatusMessage) + Send + Sync>;

pub struct VersionChecker {
    gateway: Arc<dyn CommandGateway>,
    policy: RetryPolicy,
    announce: Announcer,
    state: watch::Sender<VersionState>,
    scope: CancellationToken,
}

impl VersionChecker {
    pub fn new(
        gateway: Arc<dyn CommandGateway>,
        policy: RetryPolicy,
        announce: Announcer,
        scope: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(VersionState::default());
        Self {
            gateway,
            policy,
            announce,
            state,
            scope,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<VersionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> VersionState {
        self.state.borrow().clone()
    }

    pub async fn run(&self) -> Result<VersionState, VersionCheckError> {
        let current = match self.cancellable(self.gateway.app_version()).await? {
            Ok(version) if !version.trim().is_empty() => version,
            Ok(_) => {
                let err = BackendError::unavailable("empty app version");
                tracing::warn!(%err, "skipping update check");
                return Err(VersionCheckError::VersionUnavailable(err));
            }
            Err(err) => {
                tracing::warn!(%err, "skipping update check");
                return Err(VersionCheckError::VersionUnavailable(err));
            }
        };

        let previous = self.state();
        self.publish(VersionState {
            current_version: current.clone(),
            checking: true,
            failed: false,
            outdated: false,
            ..previous
        })?;

        let mut last_error = BackendError::unavailable("no attempts made");
        for attempt in 1..=self.policy.max_attempts {
            match self.cancellable(self.gateway.latest_version()).await? {
                Ok(latest) => return self.succeed(&current, latest),
                Err(err) => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        ?delay,
                        %err,
                        "latest version lookup failed"
                    );
                    last_error = err;
                    self.cancellable(tokio::time::sleep(delay)).await?;
                }
            }
        }

        let failed = VersionState {
            checking: false,
            failed: true,
            outdated: false,
            ..self.state()
        };
        self.publish(failed)?;
        tracing::warn!(attempts = self.policy.max_attempts, "update check gave up");
        Err(VersionCheckError::RetryExhausted {
            attempts: self.policy.max_attempts,
            last: last_error,
        })
    }

    fn succeed(&self, current: &str, latest: String) -> Result<VersionState, VersionCheckError> {
        let previous = self.state();
        let outdated = is_outdated(current, &latest);
        let notify = outdated && !previous.notified_once;
        let next = VersionState {
            current_version: current.to_string(),
            latest_version: Some(latest.clone()),
            checking: false,
            failed: false,
            outdated,
            notified_once: previous.notified_once || notify,
        };
        self.publish(next.clone())?;
        tracing::info!(current, latest = %latest, outdated, "update check finished");

        if notify {
            (self.announce)(StatusMessage::with_values(
                UPDATE_AVAILABLE_KEY,
                [("current", current.to_string()), ("latest", latest)],
            ));
        }
        Ok(next)
    }

    fn publish(&self, next: VersionState) -> Result<(), VersionCheckError> {
        if self.scope.is_cancelled() {
            return Err(VersionCheckError::Cancelled);
        }
        self.state.send_replace(next);
        Ok(())
    }

    async fn cancellable<F, T>(&self, fut: F) -> Result<T, VersionCheckError>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.scope.cancelled() => Err(VersionCheckError::Cancelled),
            value = fut => Ok(value),
        }
    }
}

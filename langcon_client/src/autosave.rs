use langcon_protocol::Command;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::dispatch::Dispatcher;
use crate::error::SessionError;
use crate::timer::TimerHandle;

pub struct AutosaveScheduler {
    delay: Duration,
    dispatcher: Arc<Dispatcher>,
    pending: Mutex<Option<TimerHandle>>,
}

impl AutosaveScheduler {
    pub(crate) fn new(delay: Duration, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            delay,
            dispatcher,
            pending: Mutex::new(None),
        }
    }

    pub fn schedule(&self) {
        let mut pending = self.pending();
        if let Some(previous) = pending.take() {
            previous.cancel();
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        *pending = Some(TimerHandle::arm(self.delay, self.dispatcher.scope(), async move {
            match dispatcher.dispatch(Command::SaveChanges).await {
                Ok(()) => tracing::debug!("autosave persisted draft"),
                Err(SessionError::Closed) => {}
                Err(err) => tracing::warn!(%err, "autosave failed; draft kept in memory"),
            }
        }));
    }

    pub fn cancel(&self) -> bool {
        match self.pending().take() {
            Some(timer) => {
                let armed = !timer.is_finished() && !timer.is_cancelled();
                timer.cancel();
                armed
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished() && !timer.is_cancelled())
    }

    fn pending(&self) -> MutexGuard<'_, Option<TimerHandle>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

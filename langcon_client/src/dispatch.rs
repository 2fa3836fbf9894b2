use langcon_protocol::Command;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::engine::ReconciliationEngine;
use crate::error::SessionError;
use crate::gateway::CommandGateway;

pub(crate) struct Dispatcher {
    engine: Mutex<ReconciliationEngine>,
    gateway: Arc<dyn CommandGateway>,
    scope: CancellationToken,
}

impl Dispatcher {
    pub(crate) fn new(
        engine: ReconciliationEngine,
        gateway: Arc<dyn CommandGateway>,
        scope: CancellationToken,
    ) -> Self {
        Self {
            engine: Mutex::new(engine),
            gateway,
            scope,
        }
    }

    pub(crate) fn engine(&self) -> MutexGuard<'_, ReconciliationEngine> {
        match self.engine.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn scope(&self) -> &CancellationToken {
        &self.scope
    }

    // A response that arrives after the scope ended is dropped.
    pub(crate) async fn dispatch(&self, command: Command) -> Result<(), SessionError> {
        if self.scope.is_cancelled() {
            return Err(SessionError::Closed);
        }

        let name = command.name();
        self.engine().stage_draft(&command);

        let result = self.gateway.invoke(command).await;
        if self.scope.is_cancelled() {
            tracing::debug!(command = name, "dropping response for closed session");
            return Err(SessionError::Closed);
        }

        match result {
            Ok(vm) => {
                self.engine().apply_view_model(vm);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(command = name, %err, "backend command failed");
                self.engine().report_failure(&err);
                Err(err.into())
            }
        }
    }
}

use langcon_protocol::PushChannel;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatch::Dispatcher;
use crate::error::BackendError;
use crate::gateway::{PushSource, Subscription};

pub struct EventBridge {
    listeners: Vec<Listener>,
}

struct Listener {
    channel: PushChannel,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl EventBridge {
    // All or nothing: a failed subscribe drops the ones already taken.
    pub(crate) fn attach(
        source: &dyn PushSource,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self, BackendError> {
        let mut listeners = Vec::with_capacity(PushChannel::ALL.len());
        for channel in PushChannel::ALL {
            let subscription = source.subscribe(channel)?;
            listeners.push(Listener::spawn(subscription, Arc::clone(&dispatcher)));
        }
        tracing::info!(channels = listeners.len(), "event bridge attached");
        Ok(Self { listeners })
    }

    pub async fn detach(mut self) {
        for mut listener in self.listeners.drain(..) {
            listener.token.cancel();
            if let Err(err) = (&mut listener.task).await {
                tracing::warn!(channel = %listener.channel, %err, "push listener ended abnormally");
            }
        }
        tracing::info!("event bridge detached");
    }
}

impl Listener {
    fn spawn(subscription: Subscription, dispatcher: Arc<Dispatcher>) -> Self {
        let channel = subscription.channel();
        let token = dispatcher.scope().child_token();
        let task = tokio::spawn(pump(subscription, dispatcher, token.clone()));
        Self { channel, token, task }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn pump(
    mut subscription: Subscription,
    dispatcher: Arc<Dispatcher>,
    token: CancellationToken,
) {
    let channel = subscription.channel();
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            next = subscription.recv() => next,
        };
        let Some(event) = next else {
            tracing::debug!(%channel, "push channel closed by publisher");
            break;
        };
        if event.channel() != channel {
            tracing::warn!(%channel, got = %event.channel(), "ignoring event on wrong channel");
            continue;
        }
        dispatcher.engine().apply_push(event);
    }
}

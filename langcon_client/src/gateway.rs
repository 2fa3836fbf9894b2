use async_trait::async_trait;
use langcon_protocol::{Command, PushChannel, PushEvent, ViewModel};
use tokio::sync::mpsc;

use crate::error::BackendError;

#[async_trait]
pub trait CommandGateway: Send + Sync {
    /// Every successful answer is a complete replacement snapshot.
    async fn invoke(&self, command: Command) -> Result<ViewModel, BackendError>;

    async fn app_version(&self) -> Result<String, BackendError>;

    async fn latest_version(&self) -> Result<String, BackendError>;
}

pub trait PushSource: Send + Sync {
    fn subscribe(&self, channel: PushChannel) -> Result<Subscription, BackendError>;
}

/// One live subscription. Dropping it releases the channel on the publisher side.
#[derive(Debug)]
pub struct Subscription {
    channel: PushChannel,
    rx: mpsc::UnboundedReceiver<PushEvent>,
}

impl Subscription {
    pub fn new(channel: PushChannel, rx: mpsc::UnboundedReceiver<PushEvent>) -> Self {
        Self { channel, rx }
    }

    pub fn channel(&self) -> PushChannel {
        self.channel
    }

    pub async fn recv(&mut self) -> Option<PushEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<PushEvent> {
        self.rx.try_recv().ok()
    }
}

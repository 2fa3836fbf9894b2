use langcon_protocol::{PushChannel, PushEvent};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::error::BackendError;
use crate::gateway::{PushSource, Subscription};

/// In-process publisher. Delivery is unbounded so a slow listener never loses events.
#[derive(Default)]
pub struct PushHub {
    subscribers: Mutex<HashMap<PushChannel, Vec<mpsc::UnboundedSender<PushEvent>>>>,
}

impl PushHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: PushEvent) -> usize {
        let channel = event.channel();
        let mut subscribers = self.lock();
        let Some(senders) = subscribers.get_mut(&channel) else {
            return 0;
        };
        senders.retain(|tx| !tx.is_closed());
        let mut delivered = 0;
        for tx in senders.iter() {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        tracing::trace!(%channel, delivered, "push published");
        delivered
    }

    pub fn subscriber_count(&self, channel: PushChannel) -> usize {
        self.lock()
            .get(&channel)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PushChannel, Vec<mpsc::UnboundedSender<PushEvent>>>> {
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl PushSource for PushHub {
    fn subscribe(&self, channel: PushChannel) -> Result<Subscription, BackendError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().entry(channel).or_default().push(tx);
        Ok(Subscription::new(channel, rx))
    }
}

use crate::error::Error;
use crate::{Delivery, MemoryBroker};

use std::sync::Arc;

use async_trait::async_trait;
use courier_amqp::{BasicPublishOptions, Channel, CloseNotification, Confirmation, Publishing};
use flume::TrySendError;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub(crate) struct ChannelState {
    closed: bool,
    reason: Option<Error>,
    close_listeners: Vec<oneshot::Sender<Option<Error>>>,
    next_delivery_tag: Option<u64>,
    confirm_sinks: Vec<flume::Sender<Confirmation>>,
}

impl ChannelState {
    /// Marks the channel closed and notifies listeners. Returns `false` if it
    /// was already closed.
    pub(crate) fn shut(&mut self, reason: Option<Error>) -> bool {
        if self.closed {
            return false;
        }

        self.closed = true;
        for listener in self.close_listeners.drain(..) {
            let _ = listener.send(reason.clone());
        }
        self.reason = reason;
        self.confirm_sinks.clear();

        true
    }

    fn confirm(&mut self, ack: bool) {
        let Some(tag) = self.next_delivery_tag.as_mut() else {
            return;
        };

        let confirmation = Confirmation {
            delivery_tag: *tag,
            ack,
        };
        *tag += 1;

        self.confirm_sinks
            .retain(|sink| match sink.try_send(confirmation) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        delivery_tag = confirmation.delivery_tag,
                        "confirmation sink full, dropping confirmation"
                    );
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
    }
}

/// A channel on a [`MemoryBroker`].
///
/// Clones refer to the same channel.
#[derive(Clone, Debug)]
pub struct MemoryChannel {
    id: u16,
    broker: MemoryBroker,
    state: Arc<Mutex<ChannelState>>,
}

impl MemoryChannel {
    pub(crate) const fn new(id: u16, broker: MemoryBroker, state: Arc<Mutex<ChannelState>>) -> Self {
        Self { id, broker, state }
    }

    /// The channel number.
    #[must_use]
    pub const fn id(&self) -> u16 {
        self.id
    }

    /// Whether the channel has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Closes the channel from the broker side.
    ///
    /// `None` behaves like a graceful close.
    pub fn terminate(&self, reason: Option<Error>) {
        if self.state.lock().shut(reason.clone()) {
            match reason {
                Some(error) => warn!(channel = self.id, %error, "channel terminated"),
                None => debug!(channel = self.id, "channel terminated"),
            }
        }
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    type Error = Error;

    fn notify_close(&self) -> CloseNotification<Self::Error> {
        let (sender, receiver) = oneshot::channel();
        let mut state = self.state.lock();

        if state.closed {
            let _ = sender.send(state.reason.clone());
        } else {
            state.close_listeners.push(sender);
        }

        receiver
    }

    async fn confirm_select(&self) -> Result<(), Self::Error> {
        let mut state = self.state.lock();

        if state.closed {
            return Err(Error::channel_closed());
        }

        if let Some(error) = self.broker.state.lock().confirm_select_failure.take() {
            return Err(error);
        }

        if state.next_delivery_tag.is_none() {
            state.next_delivery_tag = Some(1);
        }

        Ok(())
    }

    fn notify_publish(&self, sink: flume::Sender<Confirmation>) {
        let mut state = self.state.lock();

        if !state.closed {
            state.confirm_sinks.push(sink);
        }
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        options: BasicPublishOptions,
        publishing: Publishing,
    ) -> Result<(), Self::Error> {
        let mut state = self.state.lock();

        if state.closed {
            return Err(Error::channel_closed());
        }

        let mut broker = self.broker.state.lock();

        if let Some(error) = broker.rejections.pop_front() {
            return Err(error);
        }

        // Unknown exchanges are a channel-level exception: the publish itself
        // goes out but the broker tears the channel down.
        if !exchange.is_empty() && !broker.exchanges.contains(exchange) {
            drop(broker);
            let error = Error::not_found(format!("no exchange '{exchange}' in vhost '/'"));
            warn!(channel = self.id, %error, "closing channel");
            state.shut(Some(error));
            return Ok(());
        }

        broker.published.push(Delivery {
            channel: self.id,
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            options,
            publishing,
        });

        let ack = if broker.nacks > 0 {
            broker.nacks -= 1;
            false
        } else {
            true
        };
        drop(broker);

        state.confirm(ack);

        Ok(())
    }

    async fn close(&self) -> Result<(), Self::Error> {
        if self.state.lock().shut(None) {
            debug!(channel = self.id, "channel closed");
            Ok(())
        } else {
            Err(Error::channel_closed())
        }
    }
}

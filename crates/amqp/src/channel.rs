use crate::confirmation::Confirmation;
use crate::publishing::Publishing;

use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;
use tokio::sync::oneshot;

/// Marker trait for channel errors
pub trait ChannelError: Clone + Debug + Error + Send + Sync + 'static {}

/// Resolves once when a channel closes.
///
/// Carries `Some(error)` when the broker or the connection closed the channel
/// abnormally and `None` on a graceful close. A dropped sender also counts as
/// a graceful close.
pub type CloseNotification<E> = oneshot::Receiver<Option<E>>;

/// Flags of the `basic.publish` method.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BasicPublishOptions {
    /// Return the message if it cannot be routed to any queue.
    pub mandatory: bool,

    /// Return the message if it cannot be delivered to a consumer right away.
    pub immediate: bool,
}

/// A trait representing a live channel on a broker connection.
///
/// A channel is owned by exactly one serving loop at a time. Once it has
/// closed, every operation on it fails and a new channel must be opened.
#[async_trait]
pub trait Channel
where
    Self: Debug + Send + Sync + 'static,
{
    /// The error type for the channel.
    type Error: ChannelError;

    /// Registers interest in the channel closing.
    fn notify_close(&self) -> CloseNotification<Self::Error>;

    /// Puts the channel into confirm mode.
    async fn confirm_select(&self) -> Result<(), Self::Error>;

    /// Forwards confirmations for messages published on this channel into `sink`.
    ///
    /// Only meaningful once the channel is in confirm mode.
    fn notify_publish(&self, sink: flume::Sender<Confirmation>);

    /// Publishes a message to an exchange.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        options: BasicPublishOptions,
        publishing: Publishing,
    ) -> Result<(), Self::Error>;

    /// Closes the channel.
    async fn close(&self) -> Result<(), Self::Error>;
}

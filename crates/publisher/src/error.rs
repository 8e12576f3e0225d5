use courier_amqp::ChannelError;
use thiserror::Error;

/// Errors that can occur when publishing.
#[derive(Clone, Debug, Error)]
pub enum Error<E>
where
    E: ChannelError,
{
    /// The publisher was cancelled.
    #[error("publisher is dead")]
    Dead,

    /// No channel has ever been attached to the publisher.
    #[error("publisher is not initialized")]
    NotInitialized,

    /// The last attached channel closed with an error. Returned to every
    /// caller until the owner attaches a new channel.
    #[error("channel closed: {0}")]
    Channel(E),

    /// The broker rejected this publish.
    #[error("publish failed: {0}")]
    Publish(E),

    /// The serving loop went away before answering.
    #[error("serving loop stopped before answering")]
    Interrupted,
}

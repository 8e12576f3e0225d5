use courier_amqp::ChannelError;
use thiserror::Error;

/// An AMQP exception raised by the in-memory broker.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("Exception ({code}) Reason: {reason:?}")]
pub struct Error {
    /// AMQP reply code.
    pub code: u16,

    /// Human readable reason.
    pub reason: String,
}

impl Error {
    /// An operator or the broker closed the connection.
    pub const CONNECTION_FORCED: u16 = 320;

    /// The referenced exchange or queue does not exist.
    pub const NOT_FOUND: u16 = 404;

    /// The request conflicts with the channel's current state.
    pub const PRECONDITION_FAILED: u16 = 406;

    /// The operation is not allowed on the channel, usually because it is closed.
    pub const CHANNEL_ERROR: u16 = 504;

    /// Creates an error with the given reply code.
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// `CONNECTION_FORCED` error.
    #[must_use]
    pub fn connection_forced(reason: impl Into<String>) -> Self {
        Self::new(Self::CONNECTION_FORCED, reason)
    }

    /// `NOT_FOUND` error.
    #[must_use]
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::new(Self::NOT_FOUND, reason)
    }

    /// `PRECONDITION_FAILED` error.
    #[must_use]
    pub fn precondition_failed(reason: impl Into<String>) -> Self {
        Self::new(Self::PRECONDITION_FAILED, reason)
    }

    /// Error returned by operations on a closed channel.
    #[must_use]
    pub fn channel_closed() -> Self {
        Self::new(Self::CHANNEL_ERROR, "channel/connection is not open")
    }
}

impl ChannelError for Error {}

use crate::publisher::PublisherId;

use courier_amqp::ChannelError;

/// A trait representing the owner of the broker connection.
///
/// The owner dials the broker, opens channels and hands them to
/// [`crate::Publisher::serve`]. Reconnect and backoff policy live entirely on
/// the owner's side.
pub trait Owner<E>
where
    Self: Send + Sync,
    E: ChannelError,
{
    /// Receives non-fatal errors, such as a channel refusing confirm mode.
    fn report_error(&self, error: E);

    /// Called once when a cancelled publisher leaves its serving loop. The
    /// owner should stop offering channels to it.
    fn forget(&self, publisher: PublisherId);
}

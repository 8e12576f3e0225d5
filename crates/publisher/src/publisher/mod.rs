mod serve;

use crate::envelope::{self, Envelope};
use crate::error::Error;
use crate::error_state::{ErrorState, ErrorStateCell};
use crate::options::PublisherOptions;
use crate::owner::Owner;
pub use serve::Detach;

use std::fmt::{self, Display};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use courier_amqp::{Channel, Confirmation, Publishing};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Identifies a publisher to its owner.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PublisherId(Uuid);

impl PublisherId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for PublisherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug)]
struct Inner<C>
where
    C: Channel,
{
    id: PublisherId,
    exchange: String,
    routing_key: String,
    template: Publishing,
    confirmations: Option<flume::Sender<Confirmation>>,
    intake_sender: flume::Sender<Envelope<C::Error>>,
    intake_receiver: flume::Receiver<Envelope<C::Error>>,
    cancellation: CancellationToken,
    dead: AtomicBool,
    forgotten: AtomicBool,
    attached: AtomicBool,
    error_state: ErrorStateCell<C::Error>,
}

/// Publishes messages to one exchange through whichever channel is attached.
///
/// Cloning is cheap and every clone refers to the same publisher.
///
/// Publishing never times out on its own: a call waits until a channel is
/// attached and the broker has answered. Wrap calls in
/// [`tokio::time::timeout`] to bound them, or [`cancel`](Self::cancel) the
/// publisher to release every waiting caller.
#[derive(Debug)]
pub struct Publisher<C>
where
    C: Channel,
{
    inner: Arc<Inner<C>>,
}

impl<C> Clone for Publisher<C>
where
    C: Channel,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C> Publisher<C>
where
    C: Channel,
{
    /// Creates a new publisher. It stays uninitialized until an owner
    /// attaches a channel with [`serve`](Self::serve).
    #[must_use]
    pub fn new(options: PublisherOptions) -> Self {
        let PublisherOptions {
            exchange,
            routing_key,
            template,
            confirmations,
        } = options;

        // Capacity 0: a hand-off completes only when a serving loop takes it
        let (intake_sender, intake_receiver) = flume::bounded(0);

        Self {
            inner: Arc::new(Inner {
                id: PublisherId::new(),
                exchange,
                routing_key,
                template,
                confirmations,
                intake_sender,
                intake_receiver,
                cancellation: CancellationToken::new(),
                dead: AtomicBool::new(false),
                forgotten: AtomicBool::new(false),
                attached: AtomicBool::new(false),
                error_state: ErrorStateCell::new(),
            }),
        }
    }

    /// The publisher's identity, as passed to [`crate::Owner::forget`].
    #[must_use]
    pub fn id(&self) -> PublisherId {
        self.inner.id
    }

    /// The exchange messages are published to.
    #[must_use]
    pub fn exchange(&self) -> &str {
        &self.inner.exchange
    }

    /// The default routing key.
    #[must_use]
    pub fn routing_key(&self) -> &str {
        &self.inner.routing_key
    }

    /// The template used by [`write`](Self::write).
    #[must_use]
    pub fn template(&self) -> &Publishing {
        &self.inner.template
    }

    /// Whether the publisher has been cancelled.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.inner.dead.load(Ordering::Acquire)
    }

    /// Whether a serving loop currently owns a channel.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::Acquire)
    }

    /// Snapshot of the error state publish calls are checked against.
    #[must_use]
    pub fn error_state(&self) -> Arc<ErrorState<C::Error>> {
        self.inner.error_state.load()
    }

    /// Publishes `body` using the template's properties and the default
    /// routing key.
    ///
    /// On success returns the number of bytes published, which is always
    /// the full length of `body`.
    ///
    /// # Errors
    ///
    /// Same as [`publish_with_routing_key`](Self::publish_with_routing_key).
    /// The body counts as consumed either way, so on failure the byte count
    /// is still `body.len()` and is not repeated in the error.
    pub async fn write(&self, body: impl Into<Bytes> + Send) -> Result<usize, Error<C::Error>> {
        let body = body.into();
        let written = body.len();

        self.publish(self.inner.template.clone().with_body(body))
            .await
            .map(|()| written)
    }

    /// Publishes a message with the default routing key.
    ///
    /// # Errors
    ///
    /// Same as [`publish_with_routing_key`](Self::publish_with_routing_key).
    pub async fn publish(&self, publishing: Publishing) -> Result<(), Error<C::Error>> {
        self.publish_with_routing_key(publishing, self.inner.routing_key.clone())
            .await
    }

    /// Publishes a message with the given routing key and waits for the
    /// broker's answer.
    ///
    /// If no channel is attached right now the call waits for the owner to
    /// attach one.
    ///
    /// # Errors
    ///
    /// - [`Error::Dead`] if the publisher is or becomes cancelled before the
    ///   request is handed to a serving loop.
    /// - [`Error::NotInitialized`] if no channel was ever attached.
    /// - [`Error::Channel`] if the last channel closed with an error and no
    ///   new one has been attached yet.
    /// - [`Error::Publish`] if the broker rejected this message.
    /// - [`Error::Interrupted`] if the serving loop was dropped mid-request.
    pub async fn publish_with_routing_key(
        &self,
        publishing: Publishing,
        routing_key: impl Into<String> + Send,
    ) -> Result<(), Error<C::Error>> {
        if self.is_dead() {
            return Err(Error::Dead);
        }

        self.inner.error_state.check()?;

        let (mut receipt, envelope) = envelope::envelope(routing_key.into(), publishing);

        let handed_off = tokio::select! {
            biased;
            () = self.inner.cancellation.cancelled() => false,
            sent = self.inner.intake_sender.send_async(envelope) => sent.is_ok(),
        };

        // A loop may have taken the envelope just as cancellation won the race
        if !handed_off && receipt.withdraw() {
            debug!(publisher = %self.inner.id, "publisher cancelled while waiting for a channel");
            return Err(Error::Dead);
        }

        receipt.wait().await
    }

    /// Cancels the publisher.
    ///
    /// Wakes every caller waiting for a channel and stops the serving loop.
    /// Cancellation is permanent. Returns `true` for the call that performed
    /// the transition and `false` for every later call.
    pub fn cancel(&self) -> bool {
        if self
            .inner
            .dead
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        info!(
            publisher = %self.inner.id,
            exchange = %self.inner.exchange,
            "publisher cancelled"
        );
        self.inner.cancellation.cancel();
        self.inner.drain_intake();

        true
    }
}

impl<C> Inner<C>
where
    C: Channel,
{
    /// Tells the owner to forget this publisher. Only the first call after
    /// cancellation reaches the owner.
    fn retire<O>(&self, owner: &O)
    where
        O: Owner<C::Error> + ?Sized,
    {
        if self
            .forgotten
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            owner.forget(self.id);
        }
    }

    /// Answers every request handed off but never picked up by a loop.
    ///
    /// Only used once the publisher is dead, when no loop will read them.
    fn drain_intake(&self) {
        let mut drained = 0_usize;

        while let Ok(mut envelope) = self.intake_receiver.try_recv() {
            if envelope.open().is_some() {
                envelope.answer(Err(Error::Dead));
                drained += 1;
            }
        }

        if drained > 0 {
            debug!(publisher = %self.id, drained, "answered stranded requests");
        }
    }
}

use super::Publisher;
use crate::envelope::Envelope;
use crate::error::Error;
use crate::owner::Owner;

use std::sync::atomic::{AtomicBool, Ordering};

use courier_amqp::{BasicPublishOptions, Channel};
use tracing::{debug, info, warn};

/// Why a serving loop handed control back to the owner.
#[derive(Clone, Debug)]
pub enum Detach<E> {
    /// The publisher was cancelled. The channel was closed and the owner
    /// told to forget the publisher.
    Cancelled,

    /// The channel closed. A close error, if any, is now the publisher's
    /// sticky error; the owner should attach a new channel.
    Closed(Option<E>),

    /// Another serving loop already owns a channel. The offered channel was
    /// closed without being used.
    AlreadyAttached,
}

/// Marks the publisher as attached for as long as it is held.
struct Attachment<'a>(&'a AtomicBool);

impl<'a> Attachment<'a> {
    fn acquire(attached: &'a AtomicBool) -> Option<Self> {
        attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(attached))
    }
}

impl Drop for Attachment<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<C> Publisher<C>
where
    C: Channel,
{
    /// Serves publish requests through `channel` until it closes or the
    /// publisher is cancelled.
    ///
    /// The owner calls this whenever it has a live channel for the publisher
    /// and calls it again with a fresh channel after it returns
    /// [`Detach::Closed`]. Entering the loop clears any sticky error. At most
    /// one loop runs per publisher; a concurrent call returns
    /// [`Detach::AlreadyAttached`].
    pub async fn serve<O>(&self, owner: &O, channel: C) -> Detach<C::Error>
    where
        O: Owner<C::Error> + ?Sized,
    {
        let inner = &self.inner;

        let Some(_attachment) = Attachment::acquire(&inner.attached) else {
            warn!(publisher = %inner.id, "serving loop already attached, refusing channel");
            if let Err(e) = channel.close().await {
                debug!(publisher = %inner.id, error = %e, "failed to close refused channel");
            }
            return Detach::AlreadyAttached;
        };

        // Leave the stored error state alone on a dead publisher
        if inner.cancellation.is_cancelled() {
            inner.retire(owner);
            debug!(publisher = %inner.id, "publisher is dead, refusing channel");
            if let Err(e) = channel.close().await {
                debug!(publisher = %inner.id, error = %e, "failed to close refused channel");
            }
            return Detach::Cancelled;
        }

        inner.error_state.reset();
        let mut closed = channel.notify_close();

        if let Some(sink) = &inner.confirmations {
            match channel.confirm_select().await {
                Ok(()) => channel.notify_publish(sink.clone()),
                Err(e) => {
                    warn!(publisher = %inner.id, error = %e, "channel refused confirm mode");
                    owner.report_error(e);
                }
            }
        }

        debug!(publisher = %inner.id, exchange = %inner.exchange, "serving loop attached");

        loop {
            tokio::select! {
                biased;
                () = inner.cancellation.cancelled() => {
                    inner.drain_intake();
                    inner.retire(owner);
                    if let Err(e) = channel.close().await {
                        debug!(publisher = %inner.id, error = %e, "failed to close channel");
                    }
                    info!(publisher = %inner.id, "serving loop stopped");
                    return Detach::Cancelled;
                }
                notification = &mut closed => {
                    return match notification {
                        Ok(Some(error)) => {
                            warn!(publisher = %inner.id, error = %error, "channel closed with error");
                            inner.error_state.fail(error.clone());
                            Detach::Closed(Some(error))
                        }
                        Ok(None) | Err(_) => {
                            debug!(publisher = %inner.id, "channel closed");
                            Detach::Closed(None)
                        }
                    };
                }
                Ok(envelope) = inner.intake_receiver.recv_async() => {
                    self.forward(&channel, envelope).await;
                }
            }
        }
    }

    async fn forward(&self, channel: &C, mut envelope: Envelope<C::Error>) {
        let inner = &self.inner;

        let Some(publishing) = envelope.open() else {
            debug!(publisher = %inner.id, "caller withdrew its request");
            return;
        };

        let result = channel
            .publish(
                &inner.exchange,
                envelope.routing_key(),
                BasicPublishOptions {
                    mandatory: false,
                    immediate: false,
                },
                publishing,
            )
            .await
            .map_err(|e| {
                debug!(
                    publisher = %inner.id,
                    routing_key = envelope.routing_key(),
                    error = %e,
                    "publish rejected"
                );
                Error::Publish(e)
            });

        envelope.answer(result);
    }
}

//! Request/reply hand-off between publish callers and the serving loop.
//!
//! An [`Envelope`] carries the message through the intake queue so the loop
//! never waits on a caller. Whoever first flips the shared claim owns the
//! request: the loop by claiming it for publishing, or the caller by
//! withdrawing it after losing the hand-off race against cancellation.

use crate::error::Error;

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use courier_amqp::{ChannelError, Publishing};
use tokio::sync::oneshot;

type Reply<E> = Result<(), Error<E>>;

fn take_claim(claim: &AtomicBool) -> bool {
    claim
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

/// The loop's half of a publish request.
#[derive(Debug)]
pub(crate) struct Envelope<E>
where
    E: ChannelError,
{
    routing_key: String,
    publishing: Publishing,
    claim: Arc<AtomicBool>,
    reply: oneshot::Sender<Reply<E>>,
}

/// The caller's half of a publish request.
///
/// Dropping it before the loop claimed the request withdraws the request.
#[derive(Debug)]
pub(crate) struct Receipt<E>
where
    E: ChannelError,
{
    claim: Arc<AtomicBool>,
    reply: oneshot::Receiver<Reply<E>>,
}

/// Creates a linked receipt and envelope for publishing `publishing` to
/// `routing_key`.
pub(crate) fn envelope<E>(routing_key: String, publishing: Publishing) -> (Receipt<E>, Envelope<E>)
where
    E: ChannelError,
{
    let claim = Arc::new(AtomicBool::new(false));
    let (reply_sender, reply_receiver) = oneshot::channel();

    (
        Receipt {
            claim: claim.clone(),
            reply: reply_receiver,
        },
        Envelope {
            routing_key,
            publishing,
            claim,
            reply: reply_sender,
        },
    )
}

impl<E> Envelope<E>
where
    E: ChannelError,
{
    pub(crate) fn routing_key(&self) -> &str {
        &self.routing_key
    }

    /// Takes ownership of the request. `None` if the caller withdrew it, in
    /// which case it must not be published.
    pub(crate) fn open(&mut self) -> Option<Publishing> {
        take_claim(&self.claim).then(|| mem::take(&mut self.publishing))
    }

    /// Sends the outcome back to the caller, consuming the envelope.
    pub(crate) fn answer(self, reply: Reply<E>) {
        // Caller may have been dropped while waiting
        let _ = self.reply.send(reply);
    }
}

impl<E> Receipt<E>
where
    E: ChannelError,
{
    /// Takes the request back. `false` once a loop has opened it; the caller
    /// must then wait for the answer.
    pub(crate) fn withdraw(&self) -> bool {
        take_claim(&self.claim)
    }

    /// Waits for the answer of whoever opened the envelope.
    pub(crate) async fn wait(&mut self) -> Reply<E> {
        (&mut self.reply).await.unwrap_or(Err(Error::Interrupted))
    }
}

impl<E> Drop for Receipt<E>
where
    E: ChannelError,
{
    fn drop(&mut self) {
        take_claim(&self.claim);
    }
}

use crate::error::Error;

use std::sync::Arc;

use arc_swap::ArcSwap;
use courier_amqp::ChannelError;

/// Outcome of the most recent serving loop, as seen by publish calls.
#[derive(Clone, Debug)]
pub enum ErrorState<E> {
    /// No channel has ever been attached.
    Uninitialized,

    /// A channel is attached, or the last one closed gracefully.
    NoError,

    /// The last channel closed with this error.
    Error(E),
}

/// Lock-free cell holding the publisher's [`ErrorState`].
///
/// Only the attached serving loop writes; every publish call reads.
#[derive(Debug)]
pub(crate) struct ErrorStateCell<E> {
    state: ArcSwap<ErrorState<E>>,
}

impl<E> ErrorStateCell<E>
where
    E: ChannelError,
{
    pub(crate) fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(ErrorState::Uninitialized),
        }
    }

    pub(crate) fn load(&self) -> Arc<ErrorState<E>> {
        self.state.load_full()
    }

    /// Clears any sticky error. Called on loop entry only.
    pub(crate) fn reset(&self) {
        self.state.store(Arc::new(ErrorState::NoError));
    }

    pub(crate) fn fail(&self, error: E) {
        self.state.store(Arc::new(ErrorState::Error(error)));
    }

    /// Fast path for publish calls: `Ok` only when requests may be enqueued.
    pub(crate) fn check(&self) -> Result<(), Error<E>> {
        match &**self.state.load() {
            ErrorState::NoError => Ok(()),
            ErrorState::Uninitialized => Err(Error::NotInitialized),
            ErrorState::Error(error) => Err(Error::Channel(error.clone())),
        }
    }
}

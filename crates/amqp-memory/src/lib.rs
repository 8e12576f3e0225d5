//! In-memory implementation of the amqp crate for tests and local development.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

/// Channels opened on the in-memory broker.
pub mod channel;

pub use channel::MemoryChannel;
pub use error::Error;

use channel::ChannelState;

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Weak};

use courier_amqp::{BasicPublishOptions, Publishing};
use parking_lot::Mutex;
use tracing::{debug, info};

/// A message accepted by the in-memory broker.
#[derive(Clone, Debug)]
pub struct Delivery {
    /// Id of the channel the message was published on.
    pub channel: u16,

    /// Target exchange.
    pub exchange: String,

    /// Routing key.
    pub routing_key: String,

    /// Publish flags.
    pub options: BasicPublishOptions,

    /// The message.
    pub publishing: Publishing,
}

#[derive(Debug)]
struct BrokerState {
    available: bool,
    exchanges: HashSet<String>,
    published: Vec<Delivery>,
    channels: Vec<Weak<Mutex<ChannelState>>>,
    next_channel_id: u16,
    rejections: VecDeque<Error>,
    nacks: usize,
    confirm_select_failure: Option<Error>,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self {
            available: true,
            exchanges: HashSet::new(),
            published: Vec::new(),
            channels: Vec::new(),
            next_channel_id: 1,
            rejections: VecDeque::new(),
            nacks: 0,
            confirm_select_failure: None,
        }
    }
}

/// An in-memory broker.
///
/// Clones share the same broker. The default exchange (`""`) always exists;
/// publishing to any other exchange requires declaring it first, otherwise
/// the broker closes the publishing channel with `NOT_FOUND`.
#[derive(Clone, Debug, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an exchange.
    pub fn declare_exchange(&self, name: impl Into<String>) {
        self.state.lock().exchanges.insert(name.into());
    }

    /// Opens a new channel.
    ///
    /// # Errors
    ///
    /// Returns a `CONNECTION_FORCED` error while the broker is disconnected.
    pub fn open_channel(&self) -> Result<MemoryChannel, Error> {
        let mut state = self.state.lock();

        if !state.available {
            return Err(Error::connection_forced("broker unavailable"));
        }

        let id = state.next_channel_id;
        state.next_channel_id = state.next_channel_id.wrapping_add(1).max(1);

        let channel_state = Arc::new(Mutex::new(ChannelState::default()));
        state.channels.retain(|channel| channel.strong_count() > 0);
        state.channels.push(Arc::downgrade(&channel_state));

        debug!(channel = id, "opened channel");

        Ok(MemoryChannel::new(id, self.clone(), channel_state))
    }

    /// Simulates losing the connection: closes every open channel with
    /// `error` and refuses new channels until [`restore`](Self::restore).
    pub fn disconnect(&self, error: Error) {
        let channels: Vec<_> = {
            let mut state = self.state.lock();
            state.available = false;
            state
                .channels
                .drain(..)
                .filter_map(|channel| channel.upgrade())
                .collect()
        };

        info!(channels = channels.len(), %error, "broker disconnected");

        for channel in channels {
            channel.lock().shut(Some(error.clone()));
        }
    }

    /// Accepts new channels again after [`disconnect`](Self::disconnect).
    pub fn restore(&self) {
        self.state.lock().available = true;
        info!("broker restored");
    }

    /// Makes the next publish on any channel fail with `error`.
    pub fn reject_next(&self, error: Error) {
        self.state.lock().rejections.push_back(error);
    }

    /// Makes the next confirmed publish come back as a nack.
    pub fn nack_next(&self) {
        self.state.lock().nacks += 1;
    }

    /// Makes the next `confirm_select` on any channel fail with `error`.
    pub fn fail_confirm_select(&self, error: Error) {
        self.state.lock().confirm_select_failure = Some(error);
    }

    /// Every message accepted so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<Delivery> {
        self.state.lock().published.clone()
    }
}

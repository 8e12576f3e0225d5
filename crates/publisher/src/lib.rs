//! Resilient publisher for AMQP-style brokers.
//!
//! A [`Publisher`] lets any number of tasks publish through one broker
//! channel that may be torn down and replaced at any time. The connection
//! owner hands a live channel to [`Publisher::serve`] whenever one becomes
//! available; callers of [`Publisher::publish`] simply wait for a channel
//! instead of managing reconnects themselves.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod envelope;
mod error_state;

/// Errors returned to publish callers.
pub mod error;

/// Options applied when a publisher is constructed.
pub mod options;

/// The connection owner that supplies publishers with channels.
pub mod owner;

/// The publisher and its serving loop.
pub mod publisher;

pub use error::Error;
pub use error_state::ErrorState;
pub use options::PublisherOptions;
pub use owner::Owner;
pub use publisher::{Detach, Publisher, PublisherId};

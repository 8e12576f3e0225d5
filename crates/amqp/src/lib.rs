//! Abstract interface for publishing to an AMQP-style broker.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Channels are sessions on a broker connection that messages are published through.
pub mod channel;

/// Confirmations are broker acknowledgements of published messages.
pub mod confirmation;

/// Publishings are messages together with their content properties.
pub mod publishing;

pub use channel::{BasicPublishOptions, Channel, ChannelError, CloseNotification};
pub use confirmation::Confirmation;
pub use publishing::{DeliveryMode, Headers, Publishing};

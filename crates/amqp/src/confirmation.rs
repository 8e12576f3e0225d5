/// Broker acknowledgement for a message published on a channel in confirm mode.
///
/// Delivery tags start at 1 when confirm mode is enabled and increase by one
/// for every message published afterwards on the same channel.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Confirmation {
    /// Sequence number of the confirmed message on its channel.
    pub delivery_tag: u64,

    /// Whether the broker took responsibility for the message.
    pub ack: bool,
}

impl Confirmation {
    /// A positive acknowledgement.
    #[must_use]
    pub const fn ack(delivery_tag: u64) -> Self {
        Self {
            delivery_tag,
            ack: true,
        }
    }

    /// A negative acknowledgement.
    #[must_use]
    pub const fn nack(delivery_tag: u64) -> Self {
        Self {
            delivery_tag,
            ack: false,
        }
    }
}

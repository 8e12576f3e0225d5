use courier_amqp::{Confirmation, Publishing};

/// Options for a publisher.
#[derive(Clone, Debug)]
pub struct PublisherOptions {
    /// Exchange every message is published to.
    pub exchange: String,

    /// Routing key used by [`crate::Publisher::publish`] and [`crate::Publisher::write`].
    pub routing_key: String,

    /// Properties that bodies passed to [`crate::Publisher::write`] are merged into.
    pub template: Publishing,

    /// Sink for broker confirmations. When set, every attached channel is
    /// put into confirm mode.
    pub confirmations: Option<flume::Sender<Confirmation>>,
}

impl PublisherOptions {
    /// Creates options for the given exchange and default routing key.
    #[must_use]
    pub fn new(exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            template: Publishing::default(),
            confirmations: None,
        }
    }

    /// Sets the message template.
    #[must_use]
    pub fn with_template(mut self, template: Publishing) -> Self {
        self.template = template;
        self
    }

    /// Enables publisher confirms, delivered into `sink`.
    #[must_use]
    pub fn with_confirmations(mut self, sink: flume::Sender<Confirmation>) -> Self {
        self.confirmations = Some(sink);
        self
    }
}

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Application headers attached to a message.
pub type Headers = HashMap<String, String>;

/// Whether the broker keeps a message across restarts.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// The message lives in memory only.
    #[default]
    Transient,

    /// The message is written to disk when routed to a durable queue.
    Persistent,
}

impl DeliveryMode {
    /// The value carried in the `delivery-mode` content property.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Transient => 1,
            Self::Persistent => 2,
        }
    }
}

/// A message to publish, together with its content properties.
///
/// Every property is optional. A body-less `Publishing` is typically used as
/// a template that per-call bodies are merged into with [`Publishing::with_body`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Publishing {
    /// Application headers.
    pub headers: Headers,

    /// MIME content type.
    pub content_type: Option<String>,

    /// MIME content encoding.
    pub content_encoding: Option<String>,

    /// Transient or persistent delivery.
    pub delivery_mode: DeliveryMode,

    /// Priority from 0 to 9.
    pub priority: u8,

    /// Application correlation identifier.
    pub correlation_id: Option<String>,

    /// Address to reply to.
    pub reply_to: Option<String>,

    /// Message expiration, in milliseconds, as the broker expects it.
    pub expiration: Option<String>,

    /// Application message identifier.
    pub message_id: Option<String>,

    /// Message timestamp.
    pub timestamp: Option<DateTime<Utc>>,

    /// Message type name.
    #[serde(rename = "type")]
    pub kind: Option<String>,

    /// Creating user id, validated by the broker when present.
    pub user_id: Option<String>,

    /// Creating application id.
    pub app_id: Option<String>,

    /// The payload.
    #[serde(skip)]
    pub body: Bytes,
}

impl Publishing {
    /// Creates a publishing with default properties and the given body.
    #[must_use]
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Returns a copy of these properties carrying `body` instead of the current body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds an application header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the delivery mode.
    #[must_use]
    pub fn with_delivery_mode(mut self, delivery_mode: DeliveryMode) -> Self {
        self.delivery_mode = delivery_mode;
        self
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Sets the message id.
    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the application id.
    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }
}

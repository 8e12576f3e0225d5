//! Publishes through an in-memory broker that drops its connection midway.
//!
//! Run with `RUST_LOG=debug` to watch the publisher detach and reattach.

use std::sync::Arc;
use std::time::Duration;

use courier_amqp::{DeliveryMode, Publishing};
use courier_amqp_memory::{Error as MemoryError, MemoryBroker, MemoryChannel};
use courier_publisher::{Detach, Owner, Publisher, PublisherId, PublisherOptions};
use tokio::time::sleep;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

struct LoggingOwner;

impl Owner<MemoryError> for LoggingOwner {
    fn report_error(&self, error: MemoryError) {
        warn!(%error, "publisher reported error");
    }

    fn forget(&self, publisher: PublisherId) {
        info!(%publisher, "publisher retired");
    }
}

async fn supervise(
    broker: MemoryBroker,
    publisher: Publisher<MemoryChannel>,
    owner: Arc<LoggingOwner>,
) {
    while !publisher.is_dead() {
        let channel = match broker.open_channel() {
            Ok(channel) => channel,
            Err(e) => {
                owner.report_error(e);
                sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        if let Detach::Cancelled | Detach::AlreadyAttached =
            publisher.serve(owner.as_ref(), channel).await
        {
            break;
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let broker = MemoryBroker::new();
    broker.declare_exchange("events");

    let (sink, confirmations) = flume::unbounded();
    let publisher = Publisher::new(
        PublisherOptions::new("events", "audit")
            .with_template(
                Publishing::default()
                    .with_content_type("application/json")
                    .with_delivery_mode(DeliveryMode::Persistent),
            )
            .with_confirmations(sink),
    );

    let supervisor = tokio::spawn(supervise(
        broker.clone(),
        publisher.clone(),
        Arc::new(LoggingOwner),
    ));

    tokio::spawn(async move {
        while let Ok(confirmation) = confirmations.recv_async().await {
            info!(tag = confirmation.delivery_tag, ack = confirmation.ack, "confirmed");
        }
    });

    for i in 0..10 {
        if i == 5 {
            broker.disconnect(MemoryError::connection_forced("simulated outage"));
            sleep(Duration::from_millis(250)).await;
            broker.restore();
        }

        match publisher.write(format!(r#"{{"seq":{i}}}"#)).await {
            Ok(written) => info!(seq = i, written, "published"),
            Err(e) => error!(seq = i, error = %e, "publish failed"),
        }

        sleep(Duration::from_millis(50)).await;
    }

    publisher.cancel();
    let _ = supervisor.await;
}
